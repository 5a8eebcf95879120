pub mod decoder;
pub mod locator;
pub mod prefix;
pub mod timestamp;

pub use decoder::{DecodeError, DecodedObject, ObjectDecoder};
pub use locator::{LocatedObject, ObjectLocator, Selection, SelectionWindow};
pub use prefix::PrefixDiscovery;
pub use timestamp::KeyTimestampExtractor;
