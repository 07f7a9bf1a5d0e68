/// Vertex buffer layout: named, typed elements with derived offsets and stride

use crate::error::Result;

/// Shader-visible data type of one vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int2,
    Int3,
    Int4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    Mat3,
    Mat4,
}

/// Scalar family of a [`DataType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Int,
    UInt,
}

impl DataType {
    /// Size in bytes
    pub const fn size(self) -> u32 {
        match self {
            DataType::Float | DataType::Int | DataType::UInt => 4,
            DataType::Float2 | DataType::Int2 | DataType::UInt2 => 4 * 2,
            DataType::Float3 | DataType::Int3 | DataType::UInt3 => 4 * 3,
            DataType::Float4 | DataType::Int4 | DataType::UInt4 => 4 * 4,
            DataType::Mat3 => 4 * 3 * 3,
            DataType::Mat4 => 4 * 4 * 4,
        }
    }

    /// Number of scalar components
    pub const fn component_count(self) -> u32 {
        match self {
            DataType::Float | DataType::Int | DataType::UInt => 1,
            DataType::Float2 | DataType::Int2 | DataType::UInt2 => 2,
            DataType::Float3 | DataType::Int3 | DataType::UInt3 => 3,
            DataType::Float4 | DataType::Int4 | DataType::UInt4 => 4,
            DataType::Mat3 => 3 * 3,
            DataType::Mat4 => 4 * 4,
        }
    }

    pub const fn scalar_kind(self) -> ScalarKind {
        match self {
            DataType::Int | DataType::Int2 | DataType::Int3 | DataType::Int4 => ScalarKind::Int,
            DataType::UInt | DataType::UInt2 | DataType::UInt3 | DataType::UInt4 => ScalarKind::UInt,
            _ => ScalarKind::Float,
        }
    }

    /// Matrices occupy one attribute location per column
    pub const fn is_matrix(self) -> bool {
        matches!(self, DataType::Mat3 | DataType::Mat4)
    }

    /// Attribute locations taken by one element of this type
    pub const fn location_count(self) -> u32 {
        match self {
            DataType::Mat3 => 3,
            DataType::Mat4 => 4,
            _ => 1,
        }
    }
}

/// What a vertex shader reads at one attribute location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInput {
    pub location: u32,
    pub kind: ScalarKind,
    /// Components per location (a matrix column counts as one location)
    pub components: u32,
}

impl VertexInput {
    pub fn new(location: u32, kind: ScalarKind, components: u32) -> Self {
        Self { location, kind, components }
    }

    /// Split a `columns`-wide input at `location` into one input per column
    pub fn columns(location: u32, kind: ScalarKind, components: u32, columns: u32) -> impl Iterator<Item = VertexInput> {
        (0..columns).map(move |column| VertexInput::new(location + column, kind, components))
    }
}

/// One attribute of a vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub data_type: DataType,
    /// Size in bytes, derived from `data_type`
    pub size: u32,
    /// Byte offset from the start of the vertex, filled in by [`BufferLayout::new`]
    pub offset: u32,
    pub normalized: bool,
}

impl Element {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: data_type.size(),
            offset: 0,
            normalized: false,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }
}

/// Ordered vertex layout
///
/// Offsets are the prefix sums of element sizes in declaration order and
/// the stride is the sum of all sizes. The layout is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLayout {
    elements: Vec<Element>,
    stride: u32,
}

impl BufferLayout {
    pub fn new(elements: Vec<Element>) -> Self {
        let mut elements = elements;
        let mut offset = 0;
        for element in &mut elements {
            element.size = element.data_type.size();
            element.offset = offset;
            offset += element.size;
        }
        Self { elements, stride: offset }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Sum of element sizes (same value as the stride for a tightly packed layout)
    pub fn total_size(&self) -> u32 {
        self.elements.iter().map(|e| e.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Two layouts are compatible when they feed the same attribute formats at the same offsets
    pub fn is_compatible_with(&self, other: &BufferLayout) -> bool {
        self.stride == other.stride
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.data_type == b.data_type && a.offset == b.offset)
    }
}

impl BufferLayout {
    /// Inputs this layout feeds, one per location in declaration order
    pub fn vertex_inputs(&self) -> Vec<VertexInput> {
        let mut inputs = Vec::new();
        let mut location = 0;
        for element in &self.elements {
            let columns = element.data_type.location_count();
            let components = element.data_type.component_count() / columns;
            inputs.extend(VertexInput::columns(location, element.data_type.scalar_kind(), components, columns));
            location += columns;
        }
        inputs
    }

    /// Check the layout feeds every input a vertex shader declares
    ///
    /// Each declared location must exist in the layout with the same
    /// scalar kind and component count. Layout locations the shader does
    /// not read are allowed.
    pub fn check_vertex_inputs(&self, declared: &[VertexInput]) -> Result<()> {
        let provided = self.vertex_inputs();
        for input in declared {
            match provided.iter().find(|p| p.location == input.location) {
                Some(p) if p.kind == input.kind && p.components == input.components => {}
                Some(p) => {
                    crate::engine_bail_warn!(
                        "car::BufferLayout",
                        "Vertex input at location {} is {:?}x{} in the shader but {:?}x{} in the buffer layout",
                        input.location,
                        input.kind,
                        input.components,
                        p.kind,
                        p.components
                    );
                }
                None => {
                    crate::engine_bail_warn!(
                        "car::BufferLayout",
                        "Shader reads vertex input location {} but the {} byte buffer layout has only {} location(s)",
                        input.location,
                        self.stride,
                        provided.len()
                    );
                }
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, DataType)> for BufferLayout {
    fn from_iter<I: IntoIterator<Item = (S, DataType)>>(iter: I) -> Self {
        BufferLayout::new(iter.into_iter().map(|(n, t)| Element::new(n, t)).collect())
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
