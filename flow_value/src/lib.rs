// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value marshalling between a host and a sandboxed flow runtime.
//!
//! A compiled flow program runs inside an isolated linear memory. The host never hands it a live
//! reference: values cross the boundary as 16-byte tagged slots written into sandbox memory by
//! the sandbox's own allocation primitives, and are read back out by inspecting that memory.
//!
//! The pieces, leaves first:
//! - [`registry::TypeRegistry`]: the build-produced schema of every basic, array and object type,
//!   addressed by index.
//! - [`handles::HandleTable`]: identity-keyed table mapping host streams to small integers.
//! - [`encode::Encoder`]: builds an intermediate [`tree::Node`] from a [`host::HostValue`] and
//!   its declared type, then serializes it bottom-up through [`abi::SandboxAbi`].
//! - [`decode::Decoder`]: reads tagged slots out of sandbox memory.
//! - [`boundary::Boundary`]: owns a loaded registry together with its handle table.
//!
//! Both directions are total. Anomalies (unknown tags, unsupported host values, short records,
//! out-of-bounds pointers) are logged through `tracing` and degrade to `undefined`/`null`
//! values rather than surfacing as errors.
//!
//! ## Example
//! ```
//! use flow_value::abi::SandboxAbi as _;
//! use flow_value::boundary::Boundary;
//! use flow_value::host::HostValue;
//! use flow_value::loopback::LoopbackSandbox;
//! use flow_value::registry::{TypeDescriptor, TypeRegistry};
//!
//! let registry = TypeRegistry::new(vec![
//!     TypeDescriptor::basic("integer"),
//!     TypeDescriptor::array("integer"),
//! ]);
//! let mut boundary = Boundary::load(registry);
//! let mut sandbox = LoopbackSandbox::new();
//!
//! let value = HostValue::Array(vec![1.into(), 2.into()]);
//! let encoded = boundary.encoder(&mut sandbox).encode_as(&value, "array:integer");
//! let decoded = boundary.decoder(sandbox.memory()).read_value(encoded.ptr().addr());
//! assert_eq!(decoded.value, value);
//! encoded.release(&mut sandbox);
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod abi;
pub mod access;
pub mod boundary;
pub mod decode;
pub mod encode;
pub mod handles;
pub mod host;
pub mod layout;
pub mod loopback;
pub mod registry;
pub mod tag;
pub mod tree;
pub mod view;

pub use abi::{SandboxAbi, SandboxPtr};
pub use boundary::Boundary;
pub use decode::{Decoder, DecoderConfig};
pub use encode::{Encoder, OwnedValue};
pub use handles::{HandleTable, StreamHandle};
pub use host::{HostRef, HostValue, Record, Tagged, ValueType};
pub use registry::{TypeDescriptor, TypeRegistry};
pub use tag::Tag;
