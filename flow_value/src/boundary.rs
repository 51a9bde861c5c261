// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-program marshalling state.
//!
//! A [`Boundary`] owns the type registry of the loaded program together with the stream handle
//! table. Handles are only meaningful for one program load; [`Boundary::reload`] forgets them.

use crate::abi::SandboxAbi;
use crate::decode::{Decoder, DecoderConfig};
use crate::encode::Encoder;
use crate::handles::HandleTable;
use crate::registry::TypeRegistry;

/// The host side of one loaded program.
#[derive(Debug, Default)]
pub struct Boundary {
    registry: TypeRegistry,
    handles: HandleTable,
    config: DecoderConfig,
}

impl Boundary {
    /// Starts marshalling for a program described by `registry`.
    #[must_use]
    pub fn load(registry: TypeRegistry) -> Self {
        tracing::debug!(types = registry.len(), "loaded type registry");
        Self {
            registry,
            handles: HandleTable::new(),
            config: DecoderConfig::default(),
        }
    }

    /// Swaps in a new program. All stream handles from the previous load are invalidated.
    pub fn reload(&mut self, registry: TypeRegistry) {
        tracing::debug!(
            types = registry.len(),
            dropped_handles = self.handles.len(),
            "reloading type registry"
        );
        self.registry = registry;
        self.handles.clear();
    }

    /// Ends the program, returning its registry.
    #[must_use]
    pub fn unload(self) -> TypeRegistry {
        tracing::debug!(handles = self.handles.len(), "unloading");
        self.registry
    }

    /// The loaded registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The stream handle table for this load.
    #[must_use]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Replaces the limits used by [`Boundary::decoder`].
    pub fn set_decoder_config(&mut self, config: DecoderConfig) {
        self.config = config;
    }

    /// Returns an encoder writing into `sandbox`.
    pub fn encoder<'a, S: SandboxAbi + ?Sized>(&'a mut self, sandbox: &'a mut S) -> Encoder<'a, S> {
        Encoder::new(sandbox, &self.registry, &mut self.handles)
    }

    /// Returns a decoder over a snapshot of sandbox memory.
    #[must_use]
    pub fn decoder<'a>(&'a self, memory: &'a [u8]) -> Decoder<'a> {
        Decoder::new(memory, &self.registry, &self.handles).with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostRef, HostValue};
    use crate::loopback::LoopbackSandbox;
    use crate::registry::TypeDescriptor;

    #[test]
    fn reload_invalidates_stream_handles() {
        let mut boundary = Boundary::load(TypeRegistry::new(alloc::vec![TypeDescriptor::basic(
            "stream"
        )]));
        let mut sandbox = LoopbackSandbox::new();
        let stream = HostRef::new(7_u8);

        let v = boundary
            .encoder(&mut sandbox)
            .encode(&HostValue::Stream(stream.clone()));
        let before = boundary.decoder(sandbox.memory()).read_ptr(v.ptr());
        assert_eq!(before.value, HostValue::Stream(stream));
        assert_eq!(boundary.handles().len(), 1);

        boundary.reload(TypeRegistry::default());
        assert!(boundary.handles().is_empty());
        assert!(boundary.registry().is_empty());
        let after = boundary.decoder(sandbox.memory()).read_ptr(v.ptr());
        assert!(after.is_undefined());
        v.release(&mut sandbox);
    }

    #[test]
    fn decoder_uses_configured_depth() {
        let mut boundary = Boundary::load(TypeRegistry::default());
        boundary.set_decoder_config(DecoderConfig { max_depth: 3 });
        let memory = [0_u8; 32];
        let decoder = boundary.decoder(&memory);
        assert!(alloc::format!("{decoder:?}").contains("max_depth: 3"));
        assert_eq!(boundary.unload().len(), 0);
    }
}
