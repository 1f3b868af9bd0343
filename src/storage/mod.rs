pub mod local;
pub mod object;
pub mod remote;
pub mod s3;

pub use local::LocalCertStore;
pub use object::ObjectStore;
pub use remote::{RemoteCertStore, UploadOutcome, UploadPolicy};
pub use s3::S3ObjectStore;
