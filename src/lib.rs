pub mod bits;
pub mod bitstream;
pub mod boxes;
pub mod entries;
pub mod error;
pub mod extract;
pub mod info;
pub mod known_boxes;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod tables;
pub mod timeline;
pub mod tree;

pub use bitstream::FrameType;
pub use boxes::{BoxData, BoxHeader, BoxKey, FourCC, Mp4Box, ParseStatus};
pub use error::{Error, Result};
pub use info::{InfoSink, InfoValue, JsonSink};
pub use parser::{FileParser, Mp4Parser, Mp4Type};
pub use reader::DataReader;
pub use registry::{BoxHandler, CustomData, Registry};
pub use timeline::{ChunkItem, Codec, MediaInfo, SampleItem, TrackInfo, TrackKind};
pub use tree::{parse_tree, read_box_header};
