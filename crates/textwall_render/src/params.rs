use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::motion::gradient::Gradient;
use crate::motion::rain::TrailTuning;
use crate::render::surface::{parse_hex, Rgb};
use crate::wall::charset::{CharPool, Fill, FillMode, Orientation, Script};
use crate::wall::grid::{Geometry, MIN_CELL_SIZE};
use crate::TextWallError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectVariant {
    /// Twinkling wall with a sweep washing over wall and highlight alike.
    Shimmer,
    /// Gradient sweep confined to the highlight over a buffered wall.
    #[default]
    Sweep,
    /// Falling glyph rain with trails around the highlight.
    Rain,
}

/// Named colors, stored as `#rrggbb` in the parameter bag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(with = "hex_color")]
    pub background: Rgb,
    #[serde(with = "hex_color")]
    pub wall: Rgb,
    #[serde(with = "hex_color")]
    pub highlight: Rgb,
    #[serde(with = "hex_color")]
    pub sweep: Rgb,
    #[serde(with = "hex_color")]
    pub trail: Rgb,
    #[serde(with = "hex_color")]
    pub glow: Rgb,
    #[serde(with = "hex_color")]
    pub overlay: Rgb,
}

impl Palette {
    fn warm() -> Self {
        Self {
            background: [8, 8, 12],
            wall: [150, 160, 180],
            highlight: [255, 214, 140],
            sweep: [255, 250, 235],
            trail: [200, 210, 230],
            glow: [255, 230, 180],
            overlay: [255, 240, 210],
        }
    }

    fn phosphor() -> Self {
        Self {
            background: [0, 6, 2],
            wall: [40, 150, 70],
            highlight: [170, 255, 190],
            sweep: [220, 255, 230],
            trail: [90, 230, 120],
            glow: [190, 255, 200],
            overlay: [235, 255, 240],
        }
    }
}

/// Every knob the engine reads. Hosts deliver these as a loose value bag;
/// see [`EffectParams::from_value`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    pub variant: EffectVariant,

    /// Viewport in pixels.
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Cell edge in pixels, at least 8.
    pub cell_size: f32,

    pub fill_mode: FillMode,
    pub script: Script,
    /// Fixed-mode text, concatenated in order.
    pub sources: Vec<String>,
    pub orientation: Orientation,

    pub highlight_text: String,
    /// Opacity of the rain highlight overlay.
    pub highlight_opacity: f32,

    /// Seconds per sweep pass.
    pub sweep_period: f32,
    /// Half the sweep window, as a fraction of the wall width.
    pub sweep_half_width: f32,
    pub base_brightness: f32,
    pub peak_brightness: f32,
    pub lock_ends: bool,
    #[serde(skip)]
    pub gradient: Gradient,

    pub wall_brightness: f32,
    /// Share of the wall brightness that oscillates.
    pub twinkle_depth: f32,
    /// How much the sweep brightens the wall itself; zero keeps it off the wall.
    pub wall_sweep_boost: f32,
    /// Cache the wall layer and refresh it at a reduced rate.
    pub buffered_base: bool,

    /// Simulation steps per second.
    pub step_rate: f32,
    pub inject_inside: f32,
    pub inject_outside: f32,
    pub decay_inside: f32,
    pub decay_outside: f32,
    pub drop_speed_min: f32,
    pub drop_speed_max: f32,
    /// Twinkle stripes per second; zero disables the ambient refresh.
    pub twinkle_rate: f32,
    pub trail_alpha_cap: f32,
    pub lift_strength: f32,

    pub colors: Palette,
}

/// Which parts of the engine a parameter update invalidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParamChange {
    pub rebuild: bool,
    pub highlight: bool,
    pub period: bool,
    pub appearance: bool,
}

impl ParamChange {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::preset(EffectVariant::default())
    }
}

impl EffectParams {
    pub fn preset(variant: EffectVariant) -> Self {
        let trail = TrailTuning::default();
        let base = Self {
            variant,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            cell_size: 16.0,
            fill_mode: FillMode::Random,
            script: Script::Latin,
            sources: Vec::new(),
            orientation: Orientation::Horizontal,
            highlight_text: "TEXT\\nWALL".to_owned(),
            highlight_opacity: 0.9,
            sweep_period: 4.0,
            sweep_half_width: 0.15,
            base_brightness: 0.3,
            peak_brightness: 1.0,
            lock_ends: true,
            gradient: Gradient::plateau(),
            wall_brightness: 0.16,
            twinkle_depth: 0.6,
            wall_sweep_boost: 0.0,
            buffered_base: true,
            step_rate: 24.0,
            inject_inside: trail.inject_inside,
            inject_outside: trail.inject_outside,
            decay_inside: trail.decay_inside,
            decay_outside: trail.decay_outside,
            drop_speed_min: trail.speed_min,
            drop_speed_max: trail.speed_max,
            twinkle_rate: 0.0,
            trail_alpha_cap: 0.55,
            lift_strength: 0.12,
            colors: Palette::warm(),
        };

        match variant {
            EffectVariant::Sweep => base,
            EffectVariant::Shimmer => Self {
                highlight_text: "SHIMMER".to_owned(),
                sweep_period: 5.0,
                sweep_half_width: 0.18,
                base_brightness: 0.35,
                gradient: Gradient::bell(),
                wall_brightness: 0.22,
                twinkle_depth: 0.7,
                wall_sweep_boost: 0.35,
                buffered_base: false,
                ..base
            },
            EffectVariant::Rain => Self {
                script: Script::Matrix,
                highlight_text: "RAIN".to_owned(),
                wall_brightness: 0.12,
                twinkle_depth: 0.5,
                buffered_base: false,
                twinkle_rate: 6.0,
                colors: Palette::phosphor(),
                ..base
            },
        }
    }

    /// Builds parameters from a loose value bag.
    ///
    /// Missing keys take the preset of the requested variant. A malformed
    /// `gradient` or color falls back to the preset value; any other
    /// mistyped field is an error.
    pub fn from_value(value: &Value) -> Result<Self, TextWallError> {
        let mut bag = match value {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(TextWallError::InvalidParams("expected an object".to_owned())),
        };

        let variant = match bag.get("variant") {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => EffectVariant::default(),
        };
        let preset = Self::preset(variant);

        let gradient = match bag.remove("gradient") {
            Some(raw) => Gradient::from_value(&raw).unwrap_or_else(|| {
                warn!("malformed gradient {raw}, using preset stops");
                preset.gradient.clone()
            }),
            None => preset.gradient.clone(),
        };

        if let Some(Value::Object(colors)) = bag.get_mut("colors") {
            colors.retain(|name, raw| {
                let valid = raw.as_str().and_then(parse_hex).is_some();
                if !valid {
                    warn!("ignoring malformed color {name} = {raw}");
                }
                valid
            });
        }

        let mut merged = serde_json::to_value(&preset)?;
        merge(&mut merged, Value::Object(bag));
        let mut params: Self = serde_json::from_value(merged)?;
        params.gradient = gradient;
        Ok(params.sanitized())
    }

    pub fn from_json_str(text: &str) -> Result<Self, TextWallError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TextWallError> {
        let value: Value = toml::from_str(text)?;
        Self::from_value(&value)
    }

    /// Clamps every field into its supported range.
    pub fn sanitized(mut self) -> Self {
        let positive = |value: f32, fallback: f32| if value.is_finite() && value > 0.0 { value } else { fallback };
        let unit = |value: f32| if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };

        self.viewport_width = positive(self.viewport_width, 1.0);
        self.viewport_height = positive(self.viewport_height, 1.0);
        self.cell_size = positive(self.cell_size, MIN_CELL_SIZE).max(MIN_CELL_SIZE);
        self.sweep_period = positive(self.sweep_period, 4.0).max(0.05);
        self.sweep_half_width = positive(self.sweep_half_width, 0.15).clamp(0.01, 0.5);
        self.base_brightness = unit(self.base_brightness);
        self.peak_brightness = unit(self.peak_brightness);
        self.highlight_opacity = unit(self.highlight_opacity);
        self.wall_brightness = unit(self.wall_brightness);
        self.twinkle_depth = unit(self.twinkle_depth);
        self.wall_sweep_boost = unit(self.wall_sweep_boost);
        self.step_rate = positive(self.step_rate, 24.0).clamp(1.0, 240.0);
        self.inject_inside = unit(self.inject_inside);
        self.inject_outside = unit(self.inject_outside);
        self.decay_inside = positive(self.decay_inside, 0.95).clamp(0.5, 0.999);
        self.decay_outside = positive(self.decay_outside, 0.86).clamp(0.5, 0.999);
        self.drop_speed_min = positive(self.drop_speed_min, 0.3).min(8.0);
        self.drop_speed_max = positive(self.drop_speed_max, 1.1).clamp(self.drop_speed_min, 8.0);
        self.twinkle_rate = if self.twinkle_rate.is_finite() { self.twinkle_rate.clamp(0.0, 120.0) } else { 0.0 };
        self.trail_alpha_cap = unit(self.trail_alpha_cap);
        self.lift_strength = unit(self.lift_strength);
        self
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::derive(self.viewport_width, self.viewport_height, self.cell_size)
    }

    pub fn fill(&self) -> Fill {
        match self.fill_mode {
            FillMode::Random => Fill::Random(self.script),
            FillMode::Fixed => Fill::Fixed {
                pool: CharPool::from_sources(&self.sources),
                orientation: self.orientation,
            },
        }
    }

    pub fn trail_tuning(&self) -> TrailTuning {
        TrailTuning {
            inject_inside: self.inject_inside,
            inject_outside: self.inject_outside,
            decay_inside: self.decay_inside,
            decay_outside: self.decay_outside,
            speed_min: self.drop_speed_min,
            speed_max: self.drop_speed_max,
            ..TrailTuning::default()
        }
    }

    /// Classifies what moving from `self` to `next` requires.
    pub fn diff(&self, next: &EffectParams) -> ParamChange {
        let rebuild = self.variant != next.variant
            || self.geometry() != next.geometry()
            || self.fill_mode != next.fill_mode
            || (next.fill_mode == FillMode::Random && self.script != next.script)
            || (next.fill_mode == FillMode::Fixed
                && (self.sources != next.sources || self.orientation != next.orientation));

        let highlight = self.highlight_text != next.highlight_text;
        let period = self.sweep_period != next.sweep_period;
        let retimed = EffectParams {
            highlight_text: next.highlight_text.clone(),
            sweep_period: next.sweep_period,
            ..self.clone()
        };
        let appearance = !rebuild && retimed != *next;

        ParamChange { rebuild, highlight, period, appearance }
    }
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    },
                }
            }
        },
        (slot, value) => *slot = value,
    }
}

mod hex_color {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::render::surface::{parse_hex, to_hex, Rgb};

    pub fn serialize<S: Serializer>(color: &Rgb, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(*color))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_hex(&text).ok_or_else(|| D::Error::custom(format!("invalid color {text:?}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_bag_is_the_default_preset() {
        let params = EffectParams::from_value(&json!({})).unwrap();
        assert_eq!(params, EffectParams::preset(EffectVariant::Sweep));
    }

    #[test]
    fn variant_picks_its_preset() {
        let params = EffectParams::from_value(&json!({ "variant": "rain", "cell_size": 20 })).unwrap();
        assert_eq!(params.variant, EffectVariant::Rain);
        assert_eq!(params.script, Script::Matrix);
        assert_eq!(params.cell_size, 20.0);
    }

    #[test]
    fn malformed_gradient_degrades_to_preset() {
        let params = EffectParams::from_value(&json!({ "gradient": "wavy" })).unwrap();
        assert_eq!(params.gradient, Gradient::plateau());

        let params = EffectParams::from_value(&json!({
            "gradient": [{ "position": 0.0, "value": 1.0 }, { "position": 1.0, "value": "x" }]
        }))
        .unwrap();
        assert_eq!(params.gradient, Gradient::plateau());
    }

    #[test]
    fn well_formed_gradient_is_used() {
        let params = EffectParams::from_value(&json!({
            "gradient": [{ "position": 0.0, "value": 0.2 }, { "position": 1.0, "value": 0.4 }]
        }))
        .unwrap();
        assert_eq!(params.gradient.len(), 2);
    }

    #[test]
    fn malformed_colors_keep_preset_values() {
        let params =
            EffectParams::from_value(&json!({ "colors": { "wall": "teal", "glow": "#010203" } })).unwrap();
        assert_eq!(params.colors.wall, Palette::warm().wall);
        assert_eq!(params.colors.glow, [1, 2, 3]);
    }

    #[test]
    fn mistyped_fields_are_errors() {
        assert!(EffectParams::from_value(&json!({ "cell_size": "large" })).is_err());
        assert!(EffectParams::from_value(&json!(12)).is_err());
    }

    #[test]
    fn toml_bags_parse() {
        let params = EffectParams::from_toml_str(
            r##"
            variant = "shimmer"
            highlight_text = "HI"

            [colors]
            wall = "#102030"

            [[gradient]]
            position = 0.0
            value = 0.0

            [[gradient]]
            position = 1.0
            value = 1.0
            "##,
        )
        .unwrap();
        assert_eq!(params.variant, EffectVariant::Shimmer);
        assert_eq!(params.colors.wall, [0x10, 0x20, 0x30]);
        assert_eq!(params.gradient.evaluate(0.5, false), 0.5);
    }

    #[test]
    fn sanitizing_clamps_ranges() {
        let params = EffectParams {
            cell_size: 2.0,
            sweep_half_width: 3.0,
            peak_brightness: 7.0,
            drop_speed_min: 2.0,
            drop_speed_max: 1.0,
            twinkle_rate: -1.0,
            viewport_width: f32::NAN,
            ..EffectParams::default()
        }
        .sanitized();
        assert_eq!(params.cell_size, MIN_CELL_SIZE);
        assert_eq!(params.sweep_half_width, 0.5);
        assert_eq!(params.peak_brightness, 1.0);
        assert_eq!(params.drop_speed_max, 2.0);
        assert_eq!(params.twinkle_rate, 0.0);
        assert_eq!(params.viewport_width, 1.0);
    }

    #[test]
    fn diff_classifies_changes() {
        let base = EffectParams::default();

        let resized = EffectParams { viewport_width: 640.0, ..base.clone() };
        assert!(base.diff(&resized).rebuild);

        let retexted = EffectParams { highlight_text: "NEW".to_owned(), ..base.clone() };
        let change = base.diff(&retexted);
        assert!(change.highlight && !change.rebuild && !change.appearance);

        let recolored = EffectParams { peak_brightness: 0.5, ..base.clone() };
        assert_eq!(base.diff(&recolored), ParamChange { appearance: true, ..ParamChange::default() });

        let slower = EffectParams { sweep_period: 9.0, ..base.clone() };
        assert_eq!(base.diff(&slower), ParamChange { period: true, ..ParamChange::default() });

        let mut colors = base.colors;
        colors.background = [200, 0, 0];
        let slower_recolored = EffectParams { sweep_period: 9.0, colors, ..base.clone() };
        let change = base.diff(&slower_recolored);
        assert!(change.period && change.appearance && !change.rebuild);

        // Sources only matter to the fixed fill.
        let unused_sources = EffectParams { sources: vec!["AB".to_owned()], ..base.clone() };
        assert!(!base.diff(&unused_sources).rebuild);

        assert!(base.diff(&base).is_empty());
    }
}
