//! Type definitions

pub mod backup;
pub mod brand;
pub mod export;
pub mod geocode;
pub mod history;
pub mod location;
pub mod login;
pub mod messages;
pub mod municipality;
pub mod work_order;

pub use backup::*;
pub use brand::*;
pub use export::*;
pub use geocode::*;
pub use history::*;
pub use location::*;
pub use login::*;
pub use messages::*;
pub use municipality::*;
pub use work_order::*;
