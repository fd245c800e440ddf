//! Materials - flat Phong colours with optional textures

/// RGB colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a `0xRRGGBB` literal
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn to_hex(&self) -> u32 {
        let channel = |v: f32| ((v.clamp(0.0, 1.0) * 255.0).round() as u32) & 0xff;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

/// Decoded texture metadata attached to a material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Where the image came from
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// Phong-style surface material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub shininess: f32,
    pub texture: Option<Texture>,
}

impl Material {
    pub fn new(name: impl Into<String>, color: Color, shininess: f32) -> Self {
        Self {
            name: name.into(),
            color,
            shininess,
            texture: None,
        }
    }

    /// Skin tone used when no head texture is available
    pub fn default_head() -> Self {
        Self::new("head", Color::from_hex(0xffdbac), 30.0)
    }

    /// Clothing colour used when no body texture is available
    pub fn default_body() -> Self {
        Self::new("body", Color::from_hex(0xadd8e6), 20.0)
    }
}

/// Which default slot a mesh belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialSlot {
    Head,
    Body,
}

impl MaterialSlot {
    const HEAD_HINTS: [&'static str; 4] = ["head", "face", "eye", "brow"];

    /// Classify a mesh by name (case-insensitive)
    pub fn classify(mesh_name: &str) -> Self {
        let lower = mesh_name.to_lowercase();
        if Self::HEAD_HINTS.iter().any(|hint| lower.contains(hint)) {
            MaterialSlot::Head
        } else {
            MaterialSlot::Body
        }
    }
}

/// How attachment treats materials the asset declares itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialPolicy {
    /// Declared materials win; only bare meshes get the head/body material
    #[default]
    KeepDeclared,
    /// Every mesh gets the head/body material by name
    Override,
}

/// The head and body materials applied on attach
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSet {
    pub head: Material,
    pub body: Material,
}

impl Default for MaterialSet {
    fn default() -> Self {
        Self {
            head: Material::default_head(),
            body: Material::default_body(),
        }
    }
}

impl MaterialSet {
    pub fn slot(&self, slot: MaterialSlot) -> &Material {
        match slot {
            MaterialSlot::Head => &self.head,
            MaterialSlot::Body => &self.body,
        }
    }

    pub fn slot_mut(&mut self, slot: MaterialSlot) -> &mut Material {
        match slot {
            MaterialSlot::Head => &mut self.head,
            MaterialSlot::Body => &mut self.body,
        }
    }

    /// Material for a mesh by name
    pub fn for_mesh(&self, mesh_name: &str) -> &Material {
        self.slot(MaterialSlot::classify(mesh_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        let skin = Color::from_hex(0xffdbac);
        assert!((skin.r - 1.0).abs() < 1e-6);
        assert_eq!(skin.to_hex(), 0xffdbac);
    }

    #[test]
    fn test_slot_classification() {
        assert_eq!(MaterialSlot::classify("Head_Mesh"), MaterialSlot::Head);
        assert_eq!(MaterialSlot::classify("LeftEyeBrow"), MaterialSlot::Head);
        assert_eq!(MaterialSlot::classify("FACE"), MaterialSlot::Head);
        assert_eq!(MaterialSlot::classify("Torso"), MaterialSlot::Body);
        assert_eq!(MaterialSlot::classify(""), MaterialSlot::Body);
    }

    #[test]
    fn test_default_materials() {
        let set = MaterialSet::default();
        assert_eq!(set.head.color.to_hex(), 0xffdbac);
        assert_eq!(set.head.shininess, 30.0);
        assert_eq!(set.for_mesh("jacket").color.to_hex(), 0xadd8e6);
        assert_eq!(set.for_mesh("jacket").shininess, 20.0);
    }
}
