//! ChatVault Ingest: routes captured batches to the local store or to a
//! remote aggregator.

pub mod media;
pub mod remote;
pub mod router;

pub use media::MediaStore;
pub use remote::{ForwardReport, RemoteForwarder};
pub use router::{persist_local, IngestOutcome, IngestRouter};
