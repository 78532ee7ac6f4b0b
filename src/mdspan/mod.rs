//! mdspan-style views and memory-space accessors

pub mod accessor;
pub mod conjugated;
pub mod space;
pub mod traits;
pub mod view;

pub use accessor::{Accessor, AccessorPolicy, DataHandle, DefaultAccessor};
pub use conjugated::{Complex, Conjugate, ConjugatedAccessor, conjugate_transposed, conjugated, transposed};
pub use space::{DeviceAccessor, HostAccessor, ManagedAccessor};
pub use view::{DeviceView, Extents, HostView, Layout, LayoutLeft, LayoutRight, ManagedView, MdView};
