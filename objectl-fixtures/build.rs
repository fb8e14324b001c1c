use prost::Message;
use std::env::var;
use std::io::Result;

fn main() -> Result<()> {
    // Services and the types they manage
    let proto_files = &[
        "proto/fulfillment/v1/clusters.proto",
        "proto/fulfillment/v1/cluster_templates.proto",
        "proto/fulfillment/v1/hosts.proto",
        "proto/fulfillment/v1/host_classes.proto",
        "proto/fulfillment/v1/host_pools.proto",
        "proto/fulfillment/v1/events.proto",
        "proto/fulfillment/v1/hooks.proto",
        "proto/private/v1/clusters.proto",
        "proto/private/v1/hubs.proto",
    ];

    // Name of the folder containing the proto definitions
    let proto_folder = "proto";
    let out_dir = var("OUT_DIR").expect("Missing OUT_DIR environment variable");
    let descriptors_path = format!("{}/descriptors.bin", out_dir);

    // `protox` resolves `google/protobuf/*.proto` itself, so no `protoc` is needed.
    let descriptors = protox::compile(proto_files, [proto_folder]).unwrap();
    std::fs::write(descriptors_path, descriptors.encode_to_vec())?;

    println!("cargo:rerun-if-changed={proto_folder}");
    Ok(())
}
