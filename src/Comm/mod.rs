pub mod builder;
mod collective;
pub mod communicator;
pub mod pack;
pub mod reduce;
pub mod request;
mod world;

pub use builder::{WaitStrategy, WorldBuilder, WorldConfig};
pub use communicator::{wtime, Communicator};
pub use pack::{pack, unpack};
pub use reduce::{Datatype, Op};
pub use request::Request;
pub use world::World;
