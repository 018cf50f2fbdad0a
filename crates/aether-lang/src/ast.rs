pub mod error;
pub mod node;
pub mod parser;

use std::sync::Arc;

use smallvec::SmallVec;
use smol_str::SmolStr;

pub type IdentName = SmolStr;
pub type Params = SmallVec<[node::Ident; 4]>;
pub type Program = Vec<Arc<node::Node>>;
