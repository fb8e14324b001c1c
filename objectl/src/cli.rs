//! # CLI
//!
//! This module defines the command-line interface of `objectl` using `clap`.
//!
//! Global flags override the values of the settings file, see [`crate::settings`].
use crate::operations::{MapOperation, parse_operation};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "objectl", version, about = "Generic client for gRPC object services")]
pub struct Cli {
    /// The server URL to connect to (e.g. http://localhost:8000)
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// Path to the descriptor set (.bin) describing the services of the server
    #[arg(long, global = true)]
    pub descriptors: Option<PathBuf>,

    /// Package to scan for object services, as `name` or `name=order`. Can be repeated.
    #[arg(short = 'p', long = "package", global = true, value_parser = parse_package)]
    pub packages: Vec<(String, i32)>,

    /// Header added to every request, as `key:value`. Can be repeated.
    #[arg(short = 'H', long = "header", global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Directory containing `<full.name>.yaml` table layouts
    #[arg(long, global = true)]
    pub tables_dir: Option<PathBuf>,

    /// Settings file, by default `settings.json` in the user configuration directory
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the object types supported by the server
    Types,

    /// Show objects
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// objectl get clusters
    /// objectl get cluster my-cluster --output json
    /// objectl get hosts --filter 'this.power_state == 1'
    /// ```
    Get {
        /// Object type: full name, singular or plural (e.g. `cluster`)
        object_type: String,

        /// Identifiers or names of the objects. All the objects if empty.
        keys: Vec<String>,

        /// Expression used to filter the results (e.g. `this.metadata.name == "my"`)
        #[arg(long)]
        filter: Option<String>,

        /// Include deleted objects
        #[arg(long)]
        include_deleted: bool,

        /// Maximum number of objects to return
        #[arg(long)]
        limit: Option<i32>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Create an object from its JSON representation
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// objectl create cluster --body '{"metadata": {"name": "my"}, "template": "small"}'
    /// ```
    Create {
        /// Object type: full name, singular or plural
        object_type: String,

        /// JSON body of the object
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,
    },

    /// Replace an object with its JSON representation, which must include the identifier
    Update {
        /// Object type: full name, singular or plural
        object_type: String,

        /// JSON body of the object
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,
    },

    /// Show the details of one object
    ///
    /// The fields shown are the columns of the table layout of the type.
    Describe {
        /// Object type: full name, singular or plural
        object_type: String,

        /// Identifier or name of the object
        key: String,
    },

    /// Add or remove labels of an object
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// objectl label cluster my-cluster env=prod team-
    /// ```
    Label {
        /// Object type: full name, singular or plural
        object_type: String,

        /// Identifier or name of the object
        key: String,

        /// Labels to set, as `key=value`, or to remove, as `key-`
        #[arg(required = true, value_parser = parse_operation)]
        operations: Vec<MapOperation>,
    },

    /// Add or remove annotations of an object
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// objectl annotate host my-host owner=ops note-
    /// ```
    Annotate {
        /// Object type: full name, singular or plural
        object_type: String,

        /// Identifier or name of the object
        key: String,

        /// Annotations to set, as `key=value`, or to remove, as `key-`
        #[arg(required = true, value_parser = parse_operation)]
        operations: Vec<MapOperation>,
    },

    /// Delete objects
    Delete {
        /// Object type: full name, singular or plural
        object_type: String,

        /// Identifiers or names of the objects
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_package(s: &str) -> Result<(String, i32), String> {
    let (name, order) = match s.split_once('=') {
        Some((name, order)) => {
            let order = order
                .trim()
                .parse()
                .map_err(|e| format!("Invalid package order '{order}': {e}"))?;
            (name.trim(), order)
        }
        None => (s.trim(), 0),
    };
    if name.is_empty() {
        return Err("Package name cannot be empty".to_string());
    }
    Ok((name.to_string(), order))
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
