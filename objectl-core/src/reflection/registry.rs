//! # Type Registry
//!
//! Owns the object descriptors found in the schema and resolves user supplied type names.
//!
//! ## Example
//!
//! ```rust,no_run
//! use objectl_core::{GrpcTransport, Registry};
//! use objectl_core::prost_reflect::DescriptorPool;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DescriptorPool::decode(std::fs::read("descriptors.bin")?.as_slice())?;
//! let transport = GrpcTransport::connect("http://localhost:8000").await?;
//!
//! let registry = Registry::builder()
//!     .transport(transport)
//!     .pool(pool)
//!     .add_package("private.v1", 0)
//!     .add_package("fulfillment.v1", 1)
//!     .build()?;
//!
//! let clusters = registry.lookup("clusters").expect("clusters are supported");
//! let cluster = clusters.get("123").await?;
//! # Ok(())
//! # }
//! ```
use super::object::ObjectDescriptor;
use super::scanner;
use crate::BuildError;
use prost_reflect::{DescriptorPool, FileDescriptor, ServiceDescriptor};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builder for [`Registry`]. The transport, the descriptor pool and at least one package are
/// mandatory.
pub struct RegistryBuilder<T> {
    transport: Option<T>,
    pool: Option<DescriptorPool>,
    packages: HashMap<String, i32>,
}

impl<T> Default for RegistryBuilder<T> {
    fn default() -> Self {
        Self {
            transport: None,
            pool: None,
            packages: HashMap::new(),
        }
    }
}

impl<T> RegistryBuilder<T> {
    /// Sets the transport used to invoke the methods.
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the pool containing the message and service descriptors.
    pub fn pool(mut self, pool: DescriptorPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Adds a package that will be scanned looking for object services. The order is used to
    /// sort the types when they are presented to the user, lower first.
    pub fn add_package(mut self, name: impl Into<String>, order: i32) -> Self {
        self.packages.insert(name.into(), order);
        self
    }

    /// Adds a set of packages, see [`RegistryBuilder::add_package`].
    pub fn add_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        self.packages
            .extend(packages.into_iter().map(|(name, order)| (name.into(), order)));
        self
    }

    pub fn build(self) -> Result<Registry<T>, BuildError> {
        let transport = self.transport.ok_or(BuildError::Missing("transport"))?;
        let pool = self.pool.ok_or(BuildError::Missing("descriptor pool"))?;
        if self.packages.is_empty() {
            return Err(BuildError::NoPackages);
        }

        Ok(Registry {
            transport: Arc::new(transport),
            pool,
            packages: self.packages,
            objects: OnceLock::new(),
        })
    }
}

/// The set of object types supported by a schema.
///
/// The schema is scanned lazily, once, the first time any method needs the list of types.
/// Concurrent callers block until that scan has finished.
pub struct Registry<T> {
    transport: Arc<T>,
    pool: DescriptorPool,
    packages: HashMap<String, i32>,
    objects: OnceLock<Vec<ObjectDescriptor<T>>>,
}

impl<T> Registry<T> {
    pub fn builder() -> RegistryBuilder<T> {
        RegistryBuilder::default()
    }

    /// The descriptor pool the types were discovered from.
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The object types, sorted by package order and then by full name.
    pub fn objects(&self) -> &[ObjectDescriptor<T>] {
        self.objects.get_or_init(|| self.scan())
    }

    /// Full names of the object types, in the order of [`Registry::objects`].
    pub fn names(&self) -> Vec<String> {
        self.objects()
            .iter()
            .map(|o| o.full_name().to_string())
            .collect()
    }

    /// Lower case singular aliases, without duplicates, in the order of [`Registry::objects`].
    pub fn singulars(&self) -> Vec<String> {
        self.aliases(ObjectDescriptor::singular)
    }

    /// Lower case plural aliases, without duplicates, in the order of [`Registry::objects`].
    pub fn plurals(&self) -> Vec<String> {
        self.aliases(ObjectDescriptor::plural)
    }

    /// Finds an object type by exact full name, or by singular or plural alias ignoring case.
    ///
    /// When two types share an alias the first one in scan order wins.
    pub fn lookup(&self, token: &str) -> Option<&ObjectDescriptor<T>> {
        self.objects().iter().find(|o| {
            o.full_name() == token
                || o.singular().eq_ignore_ascii_case(token)
                || o.plural().eq_ignore_ascii_case(token)
        })
    }

    fn aliases(&self, alias: fn(&ObjectDescriptor<T>) -> &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.objects()
            .iter()
            .map(alias)
            .filter(|a| seen.insert(*a))
            .map(str::to_string)
            .collect()
    }

    fn scan(&self) -> Vec<ObjectDescriptor<T>> {
        let mut objects: Vec<ObjectDescriptor<T>> = self
            .pool
            .files()
            .filter(|file| self.is_enabled(file))
            .flat_map(|file| file.services().collect::<Vec<_>>())
            .filter_map(|service| self.scan_service(&service))
            .collect();

        objects.sort_by(|a, b| {
            let order_a = self.order(a.package_name());
            let order_b = self.order(b.package_name());
            order_a
                .cmp(&order_b)
                .then_with(|| a.full_name().cmp(b.full_name()))
        });

        tracing::debug!(count = objects.len(), "Finished scanning object types");
        objects
    }

    fn is_enabled(&self, file: &FileDescriptor) -> bool {
        if !self.packages.contains_key(file.package_name()) {
            tracing::debug!(
                file = file.name(),
                package = file.package_name(),
                "Ignoring file because it isn't in the list of enabled packages"
            );
            return false;
        }
        tracing::debug!(file = file.name(), "Scanning file");
        true
    }

    fn scan_service(&self, service: &ServiceDescriptor) -> Option<ObjectDescriptor<T>> {
        let Some(shape) = scanner::match_service(service) else {
            tracing::debug!(
                service = service.full_name(),
                "Ignoring service because it doesn't follow the object convention"
            );
            return None;
        };
        tracing::debug!(
            service = service.full_name(),
            object = shape.object.full_name(),
            "Found object service"
        );
        Some(ObjectDescriptor::new(self.transport.clone(), shape))
    }

    fn order(&self, package: &str) -> i32 {
        self.packages.get(package).copied().unwrap_or_default()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("packages", &self.packages)
            .field("objects", &self.objects.get())
            .finish_non_exhaustive()
    }
}
