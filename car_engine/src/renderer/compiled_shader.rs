//! `.crss` compiled shader container
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! setCount            u8
//! per set:
//!   descriptorCount   u8
//!   per descriptor:
//!     binding         u8
//!     descriptorType  u8   0 = None, 1 = UniformBuffer, 2 = Sampler2D, 3 = StorageBuffer
//! codeLength          u32
//! code                [u8; codeLength]   SPIR-V
//! ```

use std::path::Path;

use crate::error::{Error, Result};

/// Kind of resource a descriptor binding exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DescriptorType {
    None = 0,
    UniformBuffer = 1,
    Sampler2D = 2,
    StorageBuffer = 3,
}

impl TryFrom<u8> for DescriptorType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DescriptorType::None),
            1 => Ok(DescriptorType::UniformBuffer),
            2 => Ok(DescriptorType::Sampler2D),
            3 => Ok(DescriptorType::StorageBuffer),
            other => Err(Error::Format(format!("unknown descriptor type {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub binding: u8,
    pub descriptor_type: DescriptorType,
}

/// One shader stage: SPIR-V code plus its descriptor set layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledShader {
    /// `sets[i]` lists the descriptors of descriptor set `i`
    pub sets: Vec<Vec<Descriptor>>,
    pub code: Vec<u8>,
}

impl CompiledShader {
    /// Serialize to the `.crss` byte layout
    ///
    /// # Errors
    ///
    /// `Error::Format` if a count does not fit its field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let set_count = u8::try_from(self.sets.len())
            .map_err(|_| Error::Format(format!("{} descriptor sets, at most 255", self.sets.len())))?;
        let code_len = u32::try_from(self.code.len())
            .map_err(|_| Error::Format("shader code larger than 4 GiB".to_string()))?;

        let mut out = Vec::with_capacity(1 + self.sets.len() * 9 + 4 + self.code.len());
        out.push(set_count);
        for (index, set) in self.sets.iter().enumerate() {
            let count = u8::try_from(set.len()).map_err(|_| {
                Error::Format(format!("set {} has {} descriptors, at most 255", index, set.len()))
            })?;
            out.push(count);
            for descriptor in set {
                out.push(descriptor.binding);
                out.push(descriptor.descriptor_type as u8);
            }
        }
        out.extend_from_slice(&code_len.to_le_bytes());
        out.extend_from_slice(&self.code);
        Ok(out)
    }

    /// Parse the `.crss` byte layout
    ///
    /// Truncated input, unknown descriptor types and trailing bytes are
    /// `Error::Format`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader { bytes, pos: 0 };

        let set_count = reader.u8()?;
        let mut sets = Vec::with_capacity(set_count as usize);
        for _ in 0..set_count {
            let descriptor_count = reader.u8()?;
            let mut set = Vec::with_capacity(descriptor_count as usize);
            for _ in 0..descriptor_count {
                let binding = reader.u8()?;
                let descriptor_type = DescriptorType::try_from(reader.u8()?)?;
                set.push(Descriptor { binding, descriptor_type });
            }
            sets.push(set);
        }

        let code_len = reader.u32_le()? as usize;
        let code = reader.take(code_len)?.to_vec();

        if reader.pos != bytes.len() {
            return Err(Error::Format(format!(
                "{} trailing bytes after shader code",
                bytes.len() - reader.pos
            )));
        }

        Ok(Self { sets, code })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))
    }

    /// Code as 32-bit SPIR-V words
    pub fn spirv_words(&self) -> Result<Vec<u32>> {
        if self.code.len() % 4 != 0 {
            return Err(Error::Format(format!(
                "SPIR-V length {} is not a multiple of 4",
                self.code.len()
            )));
        }
        Ok(self
            .code
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect())
    }

    /// Descriptor declared at `set`/`binding`, if any
    pub fn descriptor(&self, set: u32, binding: u32) -> Option<&Descriptor> {
        self.sets
            .get(set as usize)?
            .iter()
            .find(|d| d.binding as u32 == binding)
    }
}

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// True when `bytes` start with the SPIR-V magic number
pub fn is_spirv(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == SPIRV_MAGIC
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                Error::Format(format!(
                    "truncated .crss: need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.bytes.len() - self.pos
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
#[path = "compiled_shader_tests.rs"]
mod tests;
