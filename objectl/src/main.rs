//! # Objectl CLI Entry Point
//!
//! The main executable for the Objectl tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`], installs the log
//!    subscriber and merges the flags with the [`settings::Settings`] file.
//! 2. **Discovery**: Decodes the descriptor set and builds the `objectl_core::Registry` of
//!    object types.
//! 3. **Execution**: Resolves the object type given by the user and runs the operation.
//! 4. **Presentation**: Renders tables, JSON or YAML to standard output and errors to standard
//!    error.
mod cli;
mod filter;
mod formatter;
mod operations;
mod settings;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use formatter::{FormattedString, TypeList};
use objectl_core::expr::Environment;
use objectl_core::prost_reflect::{DescriptorPool, DynamicMessage, SerializeOptions};
use operations::{MapOperation, MetadataMap};
use objectl_core::{GrpcTransport, ListOptions, ObjectDescriptor, Registry, TableRenderer, Transport};
use settings::Settings;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Cli::parse();
    if let Err(err) = run(args).await {
        eprintln!("{}", FormattedString::from(err));
        process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let settings = Settings::load(args.settings.as_deref())?.merge(&args);
    let lazy = matches!(args.command, Commands::Types);
    let registry = connect(&settings, lazy).await?;
    let tables_dir = settings.tables_dir;

    match args.command {
        Commands::Types => {
            list_types(&registry);
            Ok(())
        }
        Commands::Get {
            object_type,
            keys,
            filter,
            include_deleted,
            limit,
            output,
        } => {
            let request = GetRequest {
                keys,
                filter,
                include_deleted,
                limit,
                output,
                tables_dir,
            };
            get(&registry, &object_type, request).await
        }
        Commands::Create { object_type, body } => create(&registry, &object_type, body).await,
        Commands::Update { object_type, body } => update(&registry, &object_type, body).await,
        Commands::Describe { object_type, key } => {
            describe(&registry, &object_type, &key, tables_dir).await
        }
        Commands::Label {
            object_type,
            key,
            operations,
        } => {
            edit_metadata(&registry, &object_type, &key, MetadataMap::Labels, &operations).await
        }
        Commands::Annotate {
            object_type,
            key,
            operations,
        } => {
            let map = MetadataMap::Annotations;
            edit_metadata(&registry, &object_type, &key, map, &operations).await
        }
        Commands::Delete { object_type, keys } => delete(&registry, &object_type, &keys).await,
    }
}

async fn connect(settings: &Settings, lazy: bool) -> Result<Registry<GrpcTransport>> {
    let address = settings
        .address
        .as_deref()
        .context("The server address is mandatory, use '--address' or the settings file")?;
    let path = settings.descriptors.as_deref().context(
        "The descriptor set is mandatory, use '--descriptors' or the settings file",
    )?;

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read descriptor set from '{}'", path.display()))?;
    let pool = DescriptorPool::decode(bytes.as_slice())
        .with_context(|| format!("Failed to decode descriptor set from '{}'", path.display()))?;

    let transport = if lazy {
        GrpcTransport::connect_lazy(address)?
    } else {
        GrpcTransport::connect(address).await?
    };
    let headers = settings
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let transport = transport.with_headers(headers)?;

    let packages = if settings.packages.is_empty() {
        service_packages(&pool)
    } else {
        settings.packages.clone()
    };
    tracing::debug!(?packages, "Enabled packages");

    Ok(Registry::builder()
        .transport(transport)
        .pool(pool)
        .add_packages(packages)
        .build()?)
}

/// Every package that contains services, all with the same order.
fn service_packages(pool: &DescriptorPool) -> BTreeMap<String, i32> {
    pool.files()
        .filter(|file| file.services().next().is_some())
        .map(|file| (file.package_name().to_string(), 0))
        .collect()
}

fn lookup<'r, T>(registry: &'r Registry<T>, token: &str) -> Result<&'r ObjectDescriptor<T>> {
    registry.lookup(token).ok_or_else(|| {
        anyhow!(
            "There is no object type named '{token}', the supported types are: {}",
            registry.plurals().join(", ")
        )
    })
}

fn list_types<T>(registry: &Registry<T>) {
    let types = registry
        .objects()
        .iter()
        .map(|o| {
            (
                o.full_name().to_string(),
                o.singular().to_string(),
                o.plural().to_string(),
            )
        })
        .collect();
    println!("{}", FormattedString::from(TypeList(types)));
}

/// Matches shown when a key used to find one object is ambiguous.
const FIND_LIMIT: i32 = 10;

struct GetRequest {
    keys: Vec<String>,
    filter: Option<String>,
    include_deleted: bool,
    limit: Option<i32>,
    output: OutputFormat,
    tables_dir: Option<PathBuf>,
}

async fn get<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    request: GetRequest,
) -> Result<()> {
    let object = lookup(registry, object_type)?;

    // The user's filter is only evaluated by the server, the conditions added here are checked
    // before anything is sent:
    if let Some(generated) = filter::list_filter(&request.keys, None, request.include_deleted) {
        Environment::for_object(object.descriptor().clone())
            .compile(&generated)
            .with_context(|| format!("Can't filter objects of type '{}'", object.full_name()))?;
    }
    let filter = filter::list_filter(
        &request.keys,
        request.filter.as_deref(),
        request.include_deleted,
    );

    let result = object
        .list(ListOptions {
            filter,
            limit: request.limit,
        })
        .await?;
    tracing::debug!(
        count = result.items.len(),
        total = result.total,
        "Received objects"
    );

    match request.output {
        OutputFormat::Table => {
            if result.items.is_empty() {
                println!("No matching objects.");
                return Ok(());
            }
            let mut builder = TableRenderer::builder()
                .registry(registry)
                .writer(io::stdout().lock())
                .include_deleted(request.include_deleted);
            if let Some(directory) = request.tables_dir {
                builder = builder.tables_dir(directory);
            }
            builder.build()?.render(&result.items).await?;
        }
        OutputFormat::Json => {
            let value = encode_objects(&result.items)?;
            print!("{}", FormattedString::from(value));
        }
        OutputFormat::Yaml => {
            let value = encode_objects(&result.items)?;
            print!("{}", serde_yaml::to_string(&value)?);
        }
    }
    Ok(())
}

async fn create<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    body: serde_json::Value,
) -> Result<()> {
    let object = lookup(registry, object_type)?;
    let message = decode_object(object, body)?;
    let created = object.create(message).await?;
    println!("Created {} '{}'.", object.singular(), object.id(&created));
    Ok(())
}

async fn update<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    body: serde_json::Value,
) -> Result<()> {
    let object = lookup(registry, object_type)?;
    let message = decode_object(object, body)?;
    if object.id(&message).is_empty() {
        bail!("The identifier of the {} is mandatory", object.singular());
    }
    let updated = object.update(message).await?;
    println!("Updated {} '{}'.", object.singular(), object.id(&updated));
    Ok(())
}

async fn describe<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    key: &str,
    tables_dir: Option<PathBuf>,
) -> Result<()> {
    let object = lookup(registry, object_type)?;
    let found = find_object(object, key).await?;
    let mut builder = TableRenderer::builder()
        .registry(registry)
        .writer(io::stdout().lock());
    if let Some(directory) = tables_dir {
        builder = builder.tables_dir(directory);
    }
    builder.build()?.describe(&found).await?;
    Ok(())
}

/// Applies the operations to the labels or annotations of one object and saves it with a single
/// update.
async fn edit_metadata<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    key: &str,
    map: MetadataMap,
    operations: &[MapOperation],
) -> Result<()> {
    let object = lookup(registry, object_type)?;
    let mut found = find_object(object, key).await?;

    let mut metadata = object.metadata(&found);
    map.apply(&mut metadata, operations)?;
    object.set_metadata(&mut found, metadata)?;

    let updated = object.update(found).await?;
    println!(
        "Updated {map} of {} '{}'.",
        object.singular(),
        object.id(&updated)
    );
    Ok(())
}

/// Finds the only object whose identifier or name is the key.
async fn find_object<T: Transport>(
    object: &ObjectDescriptor<T>,
    key: &str,
) -> Result<DynamicMessage> {
    let result = object
        .list(ListOptions {
            filter: Some(filter::key_filter(key)),
            limit: Some(FIND_LIMIT),
        })
        .await?;
    let mut items = result.items;
    match items.len() {
        0 => bail!(
            "There is no {} with identifier or name '{key}'",
            object.singular()
        ),
        1 => Ok(items.remove(0)),
        _ => {
            let ids: Vec<String> = items.iter().map(|item| object.id(item)).collect();
            bail!(
                "There are {} {} matching '{key}', use one of the identifiers: {}",
                result.total.max(i32::try_from(ids.len()).unwrap_or(i32::MAX)),
                object.plural(),
                ids.join(", ")
            )
        }
    }
}

/// Resolves every key to exactly one object before deleting anything.
async fn delete<T: Transport>(
    registry: &Registry<T>,
    object_type: &str,
    keys: &[String],
) -> Result<()> {
    let object = lookup(registry, object_type)?;
    let result = object
        .list(ListOptions {
            filter: filter::keys_filter(keys),
            limit: None,
        })
        .await?;

    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        let matches: Vec<String> = result
            .items
            .iter()
            .filter(|item| object.id(item) == *key || object.name(item) == *key)
            .map(|item| object.id(item))
            .collect();
        match matches.as_slice() {
            [] => bail!(
                "There is no {} with identifier or name '{key}'",
                object.singular()
            ),
            [id] => ids.push(id.clone()),
            many => bail!(
                "There are {} {} matching '{key}', use one of the identifiers: {}",
                many.len(),
                object.plural(),
                many.join(", ")
            ),
        }
    }

    for id in ids {
        match object.delete(&id).await {
            Ok(()) => println!("Deleted {} '{id}'.", object.singular()),
            Err(e) if e.is_not_found() => bail!(
                "Can't delete {} '{id}' because it doesn't exist.",
                object.singular()
            ),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn decode_object<T>(object: &ObjectDescriptor<T>, body: serde_json::Value) -> Result<DynamicMessage> {
    DynamicMessage::deserialize(object.descriptor().clone(), body)
        .with_context(|| format!("Failed to decode the body as a {}", object.full_name()))
}

/// JSON with the field names of the schema. A single object is written alone, not as a list.
fn encode_objects(objects: &[DynamicMessage]) -> Result<serde_json::Value> {
    let options = SerializeOptions::new().use_proto_field_name(true);
    let mut values = objects
        .iter()
        .map(|object| object.serialize_with_options(serde_json::value::Serializer, &options))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() == 1 {
        return Ok(values.remove(0));
    }
    Ok(serde_json::Value::Array(values))
}
