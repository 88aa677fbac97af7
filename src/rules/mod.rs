pub mod codec;
pub mod editor;
pub mod node;
pub mod path;

pub use codec::{CodecError, ScanRules};
pub use editor::EditError;
pub use node::{BoolOp, RuleNode, Timeframe};
pub use path::NodePath;
