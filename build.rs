//! Generates the tonic service glue for the upload RPC.
//!
//! The service is described manually so the build does not depend on `protoc`.
//! Message types live in `src/proto.rs`.

fn main() {
    let upload_service = tonic_build::manual::Service::builder()
        .name("VideoUploadService")
        .package("video_upload")
        .method(
            tonic_build::manual::Method::builder()
                .name("upload")
                .route_name("Upload")
                .input_type("crate::proto::UploadRequest")
                .output_type("crate::proto::UploadResponse")
                .codec_path("tonic::codec::ProstCodec")
                .client_streaming()
                .build(),
        )
        .build();

    tonic_build::manual::Builder::new().compile(&[upload_service]);

    println!("cargo:rerun-if-changed=build.rs");
}
