//! Scrolling rainbow: a hue gradient across the grid, cycling over time.

use crate::animation::registry::AnimationFactory;
use crate::animation::schema::{
    defaults_with_overrides, param_f64, ParameterMap, ParameterSchema, ParameterSpec,
};
use crate::animation::{Animation, AnimationMetadata};
use crate::error::Result;
use crate::layout::{DeviceGeometry, Frame, Rgb};
use std::time::Duration;

pub const VERSION: &str = "1.1.0";

pub fn factory() -> AnimationFactory {
    Box::new(|geometry, overrides| {
        Ok(Box::new(Rainbow::new(*geometry, overrides)) as Box<dyn Animation>)
    })
}

pub struct Rainbow {
    geometry: DeviceGeometry,
    params: ParameterMap,
}

impl Rainbow {
    pub fn new(geometry: DeviceGeometry, overrides: &ParameterMap) -> Self {
        Self {
            geometry,
            params: defaults_with_overrides(&schema(), overrides),
        }
    }
}

fn schema() -> ParameterSchema {
    let mut schema = ParameterSchema::new();
    schema.insert(
        "speed".into(),
        ParameterSpec::float(0.1, 5.0, 1.0, "Hue cycles per second"),
    );
    schema.insert(
        "spread".into(),
        ParameterSpec::float(0.0, 4.0, 1.0, "Full hue cycles laid across the grid"),
    );
    schema.insert(
        "saturation".into(),
        ParameterSpec::float(0.0, 1.0, 1.0, "Color saturation"),
    );
    schema.insert(
        "value".into(),
        ParameterSpec::float(0.0, 1.0, 1.0, "Color intensity"),
    );
    schema
}

impl Animation for Rainbow {
    fn metadata(&self) -> AnimationMetadata {
        AnimationMetadata {
            name: "rainbow".into(),
            description: "Hue gradient scrolling across the grid".into(),
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

    fn generate_frame(&mut self, elapsed: Duration, _frame_count: u64) -> Result<Frame> {
        let speed = param_f64(&self.params, "speed").unwrap_or(1.0);
        let spread = param_f64(&self.params, "spread").unwrap_or(1.0);
        let saturation = param_f64(&self.params, "saturation").unwrap_or(1.0);
        let value = param_f64(&self.params, "value").unwrap_or(1.0);

        let total = self.geometry.total_leds();
        let base = elapsed.as_secs_f64() * speed;
        let frame = (0..total)
            .map(|i| {
                let position = i as f64 / total.max(1) as f64;
                Rgb::from_hsv(base + position * spread, saturation, value)
            })
            .collect();
        Ok(frame)
    }
}
