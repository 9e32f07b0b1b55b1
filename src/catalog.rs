//! The fixed, ordered table of blob presets.
//!
//! Order matters: wheel navigation moves between neighbouring entries and
//! wraps around at both ends. The catalog is read-only; which preset comes
//! next is decided by the [`Sequencer`](crate::Sequencer).

use crate::color::Color;
use crate::error::CatalogError;

/// Time frequency of the large displacement wave. Shared by every preset.
pub const TIME_FREQUENCY: f32 = 0.3;
/// Time frequency of the small displacement wave. Shared by every preset.
pub const SMALL_WAVE_TIME_FREQUENCY: f32 = 0.3;

/// Per-preset displacement uniforms for the blob's vertex shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeParams {
    pub position_frequency: f32,
    pub position_strength: f32,
    pub small_wave_position_frequency: f32,
    pub small_wave_position_strength: f32,
}

/// Surface appearance of the blob.
///
/// `map` names a gradient image (`<gradients>/<map>.png`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialParams {
    pub roughness: f32,
    pub metalness: f32,
    pub env_map_intensity: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub transmission: f32,
    pub flat_shading: bool,
    pub wireframe: bool,
    pub map: &'static str,
}

/// One named look: background, displacement and material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub background: Color,
    pub shape: ShapeParams,
    pub material: MaterialParams,
}

const fn shape(freq: f32, strength: f32, small_freq: f32, small_strength: f32) -> ShapeParams {
    ShapeParams {
        position_frequency: freq,
        position_strength: strength,
        small_wave_position_frequency: small_freq,
        small_wave_position_strength: small_strength,
    }
}

#[allow(clippy::too_many_arguments)]
const fn material(
    roughness: f32,
    metalness: f32,
    env_map_intensity: f32,
    clearcoat: f32,
    clearcoat_roughness: f32,
    flat_shading: bool,
    map: &'static str,
) -> MaterialParams {
    MaterialParams {
        roughness,
        metalness,
        env_map_intensity,
        clearcoat,
        clearcoat_roughness,
        transmission: 0.0,
        flat_shading,
        wireframe: false,
        map,
    }
}

/// The built-in preset table.
pub const PRESETS: [Preset; 17] = [
    Preset {
        name: "CD",
        background: Color::hex(0x9D73F7),
        shape: shape(0.8, 0.5, 0.7, 0.6),
        material: material(0.3, 0.7, 0.8, 0.2, 0.2, false, "cd"),
    },
    Preset {
        name: "Cosmic Fusion",
        background: Color::hex(0xD4C4FA),
        shape: shape(1.0, 0.3, 0.5, 0.7),
        material: material(1.0, 0.0, 0.5, 0.0, 0.0, false, "cosmic-fusion"),
    },
    Preset {
        name: "Deep Ocean",
        background: Color::hex(0x99CCFF),
        shape: shape(1.1, 0.6, 0.8, 0.5),
        material: material(0.4, 0.6, 1.0, 0.3, 0.1, false, "deep-ocean"),
    },
    Preset {
        name: "Foil",
        background: Color::hex(0xE6E6E6),
        shape: shape(1.2, 0.8, 1.0, 0.6),
        material: material(0.2, 1.0, 1.5, 0.0, 0.0, false, "foil"),
    },
    Preset {
        name: "Halloween",
        background: Color::hex(0xFFB280),
        shape: shape(0.9, 0.7, 0.6, 0.8),
        material: material(0.5, 0.4, 0.9, 0.1, 0.2, true, "halloween"),
    },
    Preset {
        name: "Hologram",
        background: Color::hex(0xD8D9E6),
        shape: shape(1.5, 0.5, 1.2, 1.0),
        material: material(0.1, 0.9, 1.8, 0.3, 0.1, false, "hologram"),
    },
    Preset {
        name: "Imaginarium",
        background: Color::hex(0xB3ADEB),
        shape: shape(1.0, 0.6, 0.9, 0.7),
        material: material(0.4, 0.6, 1.1, 0.0, 0.0, false, "imaginarium"),
    },
    Preset {
        name: "Iridescent",
        background: Color::hex(0xC995F7),
        shape: shape(0.7, 0.3, 1.1, 0.9),
        material: material(0.3, 0.7, 1.2, 0.2, 0.2, false, "iridescent"),
    },
    Preset {
        name: "Lucky Day",
        background: Color::hex(0xA8DCEF),
        shape: shape(1.022, 0.99, 0.378, 0.341),
        material: material(0.292, 0.73, 0.86, 1.0, 0.0, false, "lucky-day"),
    },
    Preset {
        name: "Passion",
        background: Color::hex(0xFFB3B3),
        shape: shape(0.6, 0.4, 0.7, 0.5),
        material: material(0.4, 0.5, 0.8, 0.3, 0.2, false, "passion"),
    },
    Preset {
        name: "Pink Floyd",
        background: Color::hex(0xF48FB1),
        shape: shape(0.9, 0.5, 0.8, 0.6),
        material: material(0.3, 0.7, 1.0, 0.4, 0.3, true, "pink-floyd"),
    },
    Preset {
        name: "Purple Rain",
        background: Color::hex(0xB980FF),
        shape: shape(0.584, 0.276, 0.899, 1.266),
        material: material(0.0, 1.0, 2.0, 0.0, 0.0, false, "purple-rain"),
    },
    Preset {
        name: "Rainbow",
        background: Color::hex(0xFFF59D),
        shape: shape(0.8, 0.5, 0.7, 0.6),
        material: material(0.3, 0.7, 0.8, 0.2, 0.2, false, "rainbow"),
    },
    Preset {
        name: "Sirens",
        background: Color::hex(0x80FFE6),
        shape: shape(1.1, 0.4, 0.8, 0.7),
        material: material(0.4, 0.6, 1.0, 0.3, 0.1, false, "sirens"),
    },
    Preset {
        name: "Sunset Vibes",
        background: Color::hex(0xFFBCA4),
        shape: shape(1.0, 0.7, 1.2, 0.9),
        material: material(0.3, 0.5, 0.9, 0.2, 0.3, false, "sunset-vibes"),
    },
    Preset {
        name: "Synthwave",
        background: Color::hex(0xFF99B4),
        shape: shape(0.9, 0.4, 1.0, 0.8),
        material: material(0.4, 0.7, 1.2, 0.3, 0.2, true, "synthwave"),
    },
    Preset {
        name: "White",
        background: Color::hex(0x111111),
        shape: shape(0.7, 0.5, 0.6, 0.7),
        material: material(0.5, 0.4, 0.9, 0.2, 0.1, false, "white"),
    },
];

/// A non-empty, ordered list of presets.
#[derive(Clone, Debug)]
pub struct Catalog {
    presets: Vec<Preset>,
}

impl Catalog {
    /// Build a catalog from an explicit list. Fails on an empty list.
    pub fn new(presets: Vec<Preset>) -> Result<Self, CatalogError> {
        if presets.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { presets })
    }

    /// The built-in 17-preset table.
    pub fn builtin() -> Self {
        Self {
            presets: PRESETS.to_vec(),
        }
    }

    /// Number of presets. Always at least one.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Lookup by index.
    ///
    /// # Panics
    /// If `index` is not below [`Catalog::len`]. Use [`Catalog::get`] for
    /// indices that are not known to be in range.
    pub fn preset(&self, index: usize) -> &Preset {
        &self.presets[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    /// Every distinct gradient key, in table order.
    pub fn gradient_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = Vec::with_capacity(self.presets.len());
        for preset in &self.presets {
            if !keys.contains(&preset.material.map) {
                keys.push(preset.material.map);
            }
        }
        keys
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_seventeen_presets() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 17);
        assert_eq!(catalog.preset(0).name, "CD");
        assert_eq!(catalog.preset(16).name, "White");
        assert_eq!(catalog.preset(0).background, Color::hex(0x9D73F7));
    }

    #[test]
    fn names_and_maps_are_unique() {
        let catalog = Catalog::builtin();
        let mut names: Vec<_> = catalog.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 17);
        assert_eq!(catalog.gradient_keys().len(), 17);
    }

    #[test]
    fn material_values_stay_normalized() {
        for preset in Catalog::builtin().iter() {
            let m = preset.material;
            for v in [
                m.roughness,
                m.metalness,
                m.clearcoat,
                m.clearcoat_roughness,
                m.transmission,
            ] {
                assert!((0.0..=1.0).contains(&v), "{} out of range in {}", v, preset.name);
            }
            assert!(!m.wireframe);
        }
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert_eq!(Catalog::new(Vec::new()).unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn get_is_checked() {
        let catalog = Catalog::new(PRESETS[..3].to_vec()).unwrap();
        assert_eq!(catalog.preset(2).name, PRESETS[2].name);
        assert!(catalog.get(3).is_none());
    }

    #[test]
    #[should_panic]
    fn preset_rejects_out_of_range_index() {
        let catalog = Catalog::new(PRESETS[..3].to_vec()).unwrap();
        let _ = catalog.preset(3);
    }
}
