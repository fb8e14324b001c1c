//! # Objectl Fixtures
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide the Protobuf schema used by the
//! `objectl` tests. It is compiled from the files under `proto/`:
//!
//! * `fulfillment.v1`: the object services `Clusters`, `ClusterTemplates`, `Hosts`,
//!   `HostClasses` and `HostPools`, plus two services that don't follow the object convention:
//!   `Events` (only `Get` and `List`) and `Hooks` (numeric identifiers).
//! * `private.v1`: the object services `Clusters` and `Hubs`.
//!
//! `HostClasses` lists don't support `limit` and don't report a `total`, everything else does.
use prost_reflect::DescriptorPool;
use std::sync::LazyLock;

pub const FULFILLMENT_PACKAGE: &str = "fulfillment.v1";
pub const PRIVATE_PACKAGE: &str = "private.v1";

/// The schema encoded as a `FileDescriptorSet`, like the output of `protoc --descriptor_set_out`.
pub const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/descriptors.bin"));

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    DescriptorPool::decode(FILE_DESCRIPTOR_SET).expect("fixture descriptors must be valid")
});

/// The decoded schema. Every call returns the same pool, so descriptors obtained from different
/// calls compare equal.
pub fn descriptor_pool() -> DescriptorPool {
    POOL.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_contains_the_object_types() {
        let pool = descriptor_pool();
        for name in [
            "fulfillment.v1.Cluster",
            "fulfillment.v1.HostClass",
            "private.v1.Hub",
            "shared.v1.Metadata",
            "google.protobuf.Timestamp",
        ] {
            assert!(pool.get_message_by_name(name).is_some(), "missing {name}");
        }
        assert!(pool.get_service_by_name("fulfillment.v1.Clusters").is_some());
    }

    #[test]
    fn test_labels_are_a_map() {
        let pool = descriptor_pool();
        let metadata = pool.get_message_by_name("shared.v1.Metadata").unwrap();
        assert!(metadata.get_field_by_name("labels").unwrap().is_map());
    }

    #[test]
    fn test_host_classes_lists_have_no_limit() {
        let pool = descriptor_pool();
        let request = pool
            .get_message_by_name("fulfillment.v1.HostClassesListRequest")
            .unwrap();
        assert!(request.get_field_by_name("limit").is_none());
        assert!(request.get_field_by_name("filter").is_some());
    }
}
