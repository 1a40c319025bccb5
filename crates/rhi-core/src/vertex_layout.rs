// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Vertex layouts, their compatibility rules and the layout registry.
//!
//! A [`VertexLayout`] describes how the attributes of one vertex are packed
//! in a buffer. Programs declare the layout they consume; at draw time the
//! layout of the bound buffer is checked against it with
//! [`VertexLayout::is_compatible`] and, when the buffer carries extra
//! attributes, rewritten with [`VertexLayout::make_compatible`].
//!
//! Layouts are interned in a [`VertexLayoutRegistry`], so commands and
//! packets only carry a `u32` uid.

use crate::api::MAX_VERTEX_LAYOUT_ELEMENT_COUNT;
use crate::error::ResourceError;
use crate::utils;
use std::fmt;
use std::sync::RwLock;

/// The meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexSemantics {
    /// Object-space position.
    Position = 1,
    /// Normal vector.
    Normal = 2,
    /// Vertex color.
    Color = 3,
    /// Texture coordinates.
    TexCoord = 4,
    /// Tangent vector.
    Tangent = 5,
    /// Binormal vector.
    Binormal = 6,
    /// Skinning weights.
    BlendWeight = 7,
    /// Skinning bone indices.
    BlendIndex = 8,
    /// Bytes not consumed by the program.
    Pad = 100,
}

impl VertexSemantics {
    /// The lowercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            VertexSemantics::Position => "position",
            VertexSemantics::Normal => "normal",
            VertexSemantics::Color => "color",
            VertexSemantics::TexCoord => "texcoord",
            VertexSemantics::Tangent => "tangent",
            VertexSemantics::Binormal => "binormal",
            VertexSemantics::BlendWeight => "blend_weight",
            VertexSemantics::BlendIndex => "blend_index",
            VertexSemantics::Pad => "<pad>",
        }
    }
}

impl fmt::Display for VertexSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed attribute locations shared by every vertex program.
pub mod attr {
    /// Position.
    pub const POSITION: u32 = 0;
    /// Normal.
    pub const NORMAL: u32 = 1;
    /// Texture coordinates 0.
    pub const TEXCOORD_0: u32 = 2;
    /// Color 0.
    pub const COLOR_0: u32 = 3;
    /// Texture coordinates 1.
    pub const TEXCOORD_1: u32 = 4;
    /// Texture coordinates 2.
    pub const TEXCOORD_2: u32 = 5;
    /// Texture coordinates 3.
    pub const TEXCOORD_3: u32 = 6;
    /// Color 1.
    pub const COLOR_1: u32 = 7;
    /// Texture coordinates 4.
    pub const TEXCOORD_4: u32 = 8;
    /// Texture coordinates 5.
    pub const TEXCOORD_5: u32 = 9;
    /// Texture coordinates 6.
    pub const TEXCOORD_6: u32 = 10;
    /// Texture coordinates 7.
    pub const TEXCOORD_7: u32 = 11;
    /// Tangent.
    pub const TANGENT: u32 = 12;
    /// Binormal.
    pub const BINORMAL: u32 = 13;
    /// Skinning weights.
    pub const BLEND_WEIGHT: u32 = 14;
    /// Skinning indices.
    pub const BLEND_INDEX: u32 = 15;
    /// Number of attribute locations.
    pub const COUNT: u32 = 16;
}

/// Attribute location of a semantic, or `None` for pads and unmapped indices.
pub fn attribute_location(semantics: VertexSemantics, index: u8) -> Option<u32> {
    const TEXCOORDS: [u32; 8] = [
        attr::TEXCOORD_0,
        attr::TEXCOORD_1,
        attr::TEXCOORD_2,
        attr::TEXCOORD_3,
        attr::TEXCOORD_4,
        attr::TEXCOORD_5,
        attr::TEXCOORD_6,
        attr::TEXCOORD_7,
    ];
    match (semantics, index) {
        (VertexSemantics::Position, 0) => Some(attr::POSITION),
        (VertexSemantics::Normal, 0) => Some(attr::NORMAL),
        (VertexSemantics::TexCoord, i) => TEXCOORDS.get(i as usize).copied(),
        (VertexSemantics::Color, 0) => Some(attr::COLOR_0),
        (VertexSemantics::Color, 1) => Some(attr::COLOR_1),
        (VertexSemantics::Tangent, 0) => Some(attr::TANGENT),
        (VertexSemantics::Binormal, 0) => Some(attr::BINORMAL),
        (VertexSemantics::BlendWeight, 0) => Some(attr::BLEND_WEIGHT),
        (VertexSemantics::BlendIndex, 0) => Some(attr::BLEND_INDEX),
        _ => None,
    }
}

/// Storage type of each component of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexDataType {
    /// 32-bit float.
    Float = 1,
    /// Unsigned byte.
    Uint8 = 2,
    /// Normalized signed 16-bit integer.
    Int16N = 3,
    /// Normalized signed byte.
    Int8N = 4,
    /// Normalized unsigned byte.
    Uint8N = 5,
    /// 16-bit float.
    Half = 6,
}

impl VertexDataType {
    /// Size of one component in bytes.
    pub const fn size(self) -> u32 {
        match self {
            VertexDataType::Float => 4,
            VertexDataType::Int16N | VertexDataType::Half => 2,
            VertexDataType::Uint8 | VertexDataType::Int8N | VertexDataType::Uint8N => 1,
        }
    }

    /// The lowercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            VertexDataType::Float => "float",
            VertexDataType::Uint8 => "uint8",
            VertexDataType::Int16N => "int16n",
            VertexDataType::Int8N => "int8n",
            VertexDataType::Uint8N => "uint8n",
            VertexDataType::Half => "half",
        }
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// What the attribute means.
    pub semantics: VertexSemantics,
    /// Distinguishes attributes with the same semantics, e.g. texcoord 0 and 1.
    pub semantics_index: u8,
    /// Component type.
    pub data_type: VertexDataType,
    /// Number of components.
    pub data_count: u8,
}

impl VertexElement {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u32 {
        self.data_type.size() * self.data_count as u32
    }

    fn matches_semantics(&self, other: &VertexElement) -> bool {
        self.semantics == other.semantics && self.semantics_index == other.semantics_index
    }
}

/// An ordered list of at most eight vertex attributes, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    elements: Vec<VertexElement>,
}

impl VertexLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u32 {
        self.elements.iter().map(VertexElement::size).sum()
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// All elements in order.
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// The element at `index`.
    pub fn element(&self, index: usize) -> Option<&VertexElement> {
        self.elements.get(index)
    }

    /// Byte offset of the element at `index` from the start of the vertex.
    pub fn element_offset(&self, index: usize) -> Option<u32> {
        if index >= self.elements.len() {
            return None;
        }
        Some(self.elements[..index].iter().map(VertexElement::size).sum())
    }

    /// Size in bytes of the element at `index`.
    pub fn element_size(&self, index: usize) -> Option<u32> {
        self.elements.get(index).map(VertexElement::size)
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Appends an element.
    pub fn add_element(
        &mut self,
        semantics: VertexSemantics,
        semantics_index: u8,
        data_type: VertexDataType,
        data_count: u8,
    ) -> Result<(), ResourceError> {
        self.insert_element(
            self.elements.len(),
            semantics,
            semantics_index,
            data_type,
            data_count,
        )
    }

    /// Inserts an element before position `pos`.
    pub fn insert_element(
        &mut self,
        pos: usize,
        semantics: VertexSemantics,
        semantics_index: u8,
        data_type: VertexDataType,
        data_count: u8,
    ) -> Result<(), ResourceError> {
        if self.elements.len() >= MAX_VERTEX_LAYOUT_ELEMENT_COUNT || pos > self.elements.len() {
            return Err(ResourceError::OutOfBounds);
        }
        self.elements.insert(
            pos,
            VertexElement {
                semantics,
                semantics_index,
                data_type,
                data_count,
            },
        );
        Ok(())
    }

    /// Builder form of [`add_element`](Self::add_element).
    pub fn with(
        mut self,
        semantics: VertexSemantics,
        semantics_index: u8,
        data_type: VertexDataType,
        data_count: u8,
    ) -> Result<Self, ResourceError> {
        self.add_element(semantics, semantics_index, data_type, data_count)?;
        Ok(self)
    }

    /// Checks that the buffer layout provides every attribute the program layout consumes.
    ///
    /// Elements are matched by semantics and index regardless of position. The
    /// buffer element must have the same data type and at least as many components.
    pub fn is_compatible(vb_layout: &VertexLayout, shader_layout: &VertexLayout) -> bool {
        shader_layout
            .elements
            .iter()
            .filter(|e| e.semantics != VertexSemantics::Pad)
            .all(|wanted| Self::find_provider(vb_layout, wanted).is_some())
    }

    /// Rewrites the buffer layout so that it only exposes what the program consumes.
    ///
    /// The result keeps the buffer's element order and stride; attributes the
    /// program ignores become pad bytes. Returns `None` when the buffer lacks an
    /// attribute the program needs.
    pub fn make_compatible(
        vb_layout: &VertexLayout,
        shader_layout: &VertexLayout,
    ) -> Option<VertexLayout> {
        if !Self::is_compatible(vb_layout, shader_layout) {
            return None;
        }

        let mut elements: Vec<VertexElement> = Vec::with_capacity(vb_layout.elements.len());
        for provided in &vb_layout.elements {
            let consumed = shader_layout
                .elements
                .iter()
                .any(|e| e.semantics != VertexSemantics::Pad && e.matches_semantics(provided));
            if consumed {
                elements.push(*provided);
                continue;
            }

            let mut remaining = provided.size();
            while remaining > 0 {
                match elements.last_mut() {
                    Some(pad)
                        if pad.semantics == VertexSemantics::Pad && pad.data_count < u8::MAX =>
                    {
                        let take = remaining.min((u8::MAX - pad.data_count) as u32);
                        pad.data_count += take as u8;
                        remaining -= take;
                    }
                    _ => {
                        let take = remaining.min(u8::MAX as u32);
                        elements.push(VertexElement {
                            semantics: VertexSemantics::Pad,
                            semantics_index: 0,
                            data_type: VertexDataType::Uint8,
                            data_count: take as u8,
                        });
                        remaining -= take;
                    }
                }
            }
        }

        Some(VertexLayout { elements })
    }

    fn find_provider<'a>(
        vb_layout: &'a VertexLayout,
        wanted: &VertexElement,
    ) -> Option<&'a VertexElement> {
        vb_layout.elements.iter().find(|provided| {
            provided.matches_semantics(wanted)
                && provided.data_type == wanted.data_type
                && provided.data_count >= wanted.data_count
        })
    }

    /// Logs every element with its offset.
    pub fn dump(&self) {
        log::info!(
            "vertex layout: {} elements, stride {}",
            self.elements.len(),
            self.stride()
        );
        let mut offset = 0;
        for (i, e) in self.elements.iter().enumerate() {
            log::info!(
                "  [{i}] {}{} {}{} @{offset}",
                e.semantics,
                e.semantics_index,
                e.data_type.name(),
                e.data_count
            );
            offset += e.size();
        }
    }
}

/// Interns vertex layouts and hands out stable uids.
///
/// Uids start at 1; [`VertexLayoutRegistry::INVALID_UID`] never names a layout.
#[derive(Debug, Default)]
pub struct VertexLayoutRegistry {
    layouts: RwLock<Vec<VertexLayout>>,
}

impl VertexLayoutRegistry {
    /// The uid that never names a layout.
    pub const INVALID_UID: u32 = 0;

    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the uid of `layout`, registering it on first sight.
    pub fn unique_id(&self, layout: &VertexLayout) -> u32 {
        if let Some(pos) = utils::read(&self.layouts).iter().position(|l| l == layout) {
            return pos as u32 + 1;
        }

        let mut layouts = utils::write(&self.layouts);
        // Another thread may have registered it between the two locks.
        if let Some(pos) = layouts.iter().position(|l| l == layout) {
            return pos as u32 + 1;
        }
        layouts.push(layout.clone());
        log::debug!("Registered vertex layout #{} (stride {})", layouts.len(), layout.stride());
        layouts.len() as u32
    }

    /// The layout registered under `uid`.
    pub fn get(&self, uid: u32) -> Option<VertexLayout> {
        let index = uid.checked_sub(1)? as usize;
        utils::read(&self.layouts).get(index).cloned()
    }

    /// Number of registered layouts.
    pub fn len(&self) -> usize {
        utils::read(&self.layouts).len()
    }

    /// `true` when nothing was registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_tex_color() -> VertexLayout {
        VertexLayout::new()
            .with(VertexSemantics::Position, 0, VertexDataType::Float, 3)
            .and_then(|l| l.with(VertexSemantics::TexCoord, 0, VertexDataType::Float, 2))
            .and_then(|l| l.with(VertexSemantics::Color, 0, VertexDataType::Uint8N, 4))
            .unwrap()
    }

    #[test]
    fn test_stride_and_offsets() {
        let layout = pos_tex_color();
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.element_count(), 3);
        assert_eq!(layout.element_offset(0), Some(0));
        assert_eq!(layout.element_offset(1), Some(12));
        assert_eq!(layout.element_offset(2), Some(20));
        assert_eq!(layout.element_size(2), Some(4));
        assert_eq!(layout.element_offset(3), None);
    }

    #[test]
    fn test_ninth_element_is_rejected() {
        let mut layout = VertexLayout::new();
        for i in 0..8 {
            layout
                .add_element(VertexSemantics::TexCoord, i, VertexDataType::Float, 2)
                .unwrap();
        }
        let result = layout.add_element(VertexSemantics::Normal, 0, VertexDataType::Float, 3);
        assert_eq!(result, Err(ResourceError::OutOfBounds));
        assert_eq!(layout.element_count(), 8);
    }

    #[test]
    fn test_insert_element_shifts_following_elements() {
        let mut layout = pos_tex_color();
        layout
            .insert_element(1, VertexSemantics::Normal, 0, VertexDataType::Float, 3)
            .unwrap();
        assert_eq!(layout.element(1).unwrap().semantics, VertexSemantics::Normal);
        assert_eq!(layout.element_offset(2), Some(24));
        assert!(layout
            .insert_element(9, VertexSemantics::Tangent, 0, VertexDataType::Float, 3)
            .is_err());
    }

    #[test]
    fn test_compatibility_ignores_element_order() {
        let vb = pos_tex_color();
        let shader = VertexLayout::new()
            .with(VertexSemantics::Color, 0, VertexDataType::Uint8N, 4)
            .and_then(|l| l.with(VertexSemantics::Position, 0, VertexDataType::Float, 3))
            .unwrap();
        assert!(VertexLayout::is_compatible(&vb, &shader));
    }

    #[test]
    fn test_compatibility_fails_on_missing_or_mismatched_element() {
        let vb = pos_tex_color();
        let needs_normal = VertexLayout::new()
            .with(VertexSemantics::Normal, 0, VertexDataType::Float, 3)
            .unwrap();
        assert!(!VertexLayout::is_compatible(&vb, &needs_normal));

        let wrong_index = VertexLayout::new()
            .with(VertexSemantics::TexCoord, 1, VertexDataType::Float, 2)
            .unwrap();
        assert!(!VertexLayout::is_compatible(&vb, &wrong_index));
        assert!(VertexLayout::make_compatible(&vb, &wrong_index).is_none());
    }

    #[test]
    fn test_make_compatible_pads_unused_elements() {
        let vb = pos_tex_color();
        let shader = VertexLayout::new()
            .with(VertexSemantics::Position, 0, VertexDataType::Float, 3)
            .unwrap();

        let compatible = VertexLayout::make_compatible(&vb, &shader).unwrap();

        assert_eq!(compatible.stride(), vb.stride());
        assert_eq!(compatible.element_count(), 2, "texcoord and color merge into one pad");
        assert_eq!(compatible.element(0).unwrap().semantics, VertexSemantics::Position);
        let pad = compatible.element(1).unwrap();
        assert_eq!(pad.semantics, VertexSemantics::Pad);
        assert_eq!(pad.size(), 12);
    }

    #[test]
    fn test_registry_deduplicates_layouts() {
        let registry = VertexLayoutRegistry::new();
        let a = registry.unique_id(&pos_tex_color());
        let b = registry.unique_id(&pos_tex_color());
        let c = registry.unique_id(&VertexLayout::new());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, VertexLayoutRegistry::INVALID_UID);
        assert_eq!(registry.get(a), Some(pos_tex_color()));
        assert_eq!(registry.get(VertexLayoutRegistry::INVALID_UID), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_attribute_locations() {
        assert_eq!(attribute_location(VertexSemantics::Position, 0), Some(0));
        assert_eq!(attribute_location(VertexSemantics::Color, 0), Some(3));
        assert_eq!(attribute_location(VertexSemantics::TexCoord, 1), Some(4));
        assert_eq!(attribute_location(VertexSemantics::BlendIndex, 0), Some(15));
        assert_eq!(attribute_location(VertexSemantics::Pad, 0), None);
    }
}
