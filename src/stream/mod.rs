pub mod generator;
pub mod writer;

pub use generator::{stream_batches, stream_solutions};
pub use writer::{write_csv_stream, write_json_stream, ChannelSink, RecordSink, StreamError};
