//! Solid color fill.

use crate::animation::registry::AnimationFactory;
use crate::animation::schema::{
    defaults_with_overrides, param_f64, ParameterMap, ParameterSchema, ParameterSpec,
};
use crate::animation::{Animation, AnimationMetadata};
use crate::error::Result;
use crate::layout::{DeviceGeometry, Frame, Rgb};
use std::time::Duration;

pub const VERSION: &str = "1.0.0";

pub fn factory() -> AnimationFactory {
    Box::new(|geometry, overrides| {
        Ok(Box::new(Solid::new(*geometry, overrides)) as Box<dyn Animation>)
    })
}

pub struct Solid {
    geometry: DeviceGeometry,
    params: ParameterMap,
}

impl Solid {
    pub fn new(geometry: DeviceGeometry, overrides: &ParameterMap) -> Self {
        Self {
            geometry,
            params: defaults_with_overrides(&schema(), overrides),
        }
    }

    fn channel(&self, name: &str) -> u8 {
        param_f64(&self.params, name)
            .unwrap_or(0.0)
            .clamp(0.0, 255.0)
            .round() as u8
    }
}

fn schema() -> ParameterSchema {
    let mut schema = ParameterSchema::new();
    schema.insert("red".into(), ParameterSpec::int(0, 255, 255, "Red channel"));
    schema.insert(
        "green".into(),
        ParameterSpec::int(0, 255, 255, "Green channel"),
    );
    schema.insert(
        "blue".into(),
        ParameterSpec::int(0, 255, 255, "Blue channel"),
    );
    schema
}

impl Animation for Solid {
    fn metadata(&self) -> AnimationMetadata {
        AnimationMetadata {
            name: "solid".into(),
            description: "Fill the whole grid with one color".into(),
            author: "Lumigrid Project".into(),
            version: VERSION.into(),
        }
    }

    fn parameter_schema(&self) -> ParameterSchema {
        schema()
    }

    fn params(&self) -> ParameterMap {
        self.params.clone()
    }

    fn update_parameters(&mut self, updates: &ParameterMap) -> Result<()> {
        for (name, value) in updates {
            self.params.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn generate_frame(&mut self, _elapsed: Duration, _frame_count: u64) -> Result<Frame> {
        let color = Rgb(
            self.channel("red"),
            self.channel("green"),
            self.channel("blue"),
        );
        Ok(vec![color; self.geometry.total_leds()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_default_is_white() {
        let mut solid = Solid::new(DeviceGeometry::new(1, 3), &ParameterMap::new());
        let frame = solid.generate_frame(Duration::ZERO, 0).unwrap();
        assert_eq!(frame, vec![Rgb(255, 255, 255); 3]);
    }

    #[test]
    fn test_parameter_update_changes_color() {
        let mut solid = Solid::new(DeviceGeometry::new(1, 2), &ParameterMap::new());
        let mut updates = ParameterMap::new();
        updates.insert("red".into(), Value::from(10));
        updates.insert("green".into(), Value::from(0));
        updates.insert("blue".into(), Value::from(300)); // clamped
        solid.update_parameters(&updates).unwrap();

        let frame = solid.generate_frame(Duration::ZERO, 1).unwrap();
        assert_eq!(frame[0], Rgb(10, 0, 255));
    }
}
