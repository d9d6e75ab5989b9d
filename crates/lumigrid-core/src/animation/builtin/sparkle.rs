//! Random twinkles over a fading backdrop.

use crate::animation::registry::AnimationFactory;
use crate::animation::schema::{
    defaults_with_overrides, param_f64, ParameterMap, ParameterSchema, ParameterSpec,
};
use crate::animation::{Animation, AnimationMetadata};
use crate::error::Result;
use crate::layout::{DeviceGeometry, Frame, Rgb};
use rand::Rng;
use std::time::Duration;

pub const VERSION: &str = "1.0.0";

pub fn factory() -> AnimationFactory {
    Box::new(|geometry, overrides| {
        Ok(Box::new(Sparkle::new(*geometry, overrides)) as Box<dyn Animation>)
    })
}

pub struct Sparkle {
    geometry: DeviceGeometry,
    params: ParameterMap,
    buffer: Frame,
}

impl Sparkle {
    pub fn new(geometry: DeviceGeometry, overrides: &ParameterMap) -> Self {
        Self {
            geometry,
            params: defaults_with_overrides(&schema(), overrides),
            buffer: geometry.blank_frame(),
        }
    }
}

fn schema() -> ParameterSchema {
    let mut schema = ParameterSchema::new();
    schema.insert(
        "density".into(),
        ParameterSpec::float(0.0, 1.0, 0.02, "Chance per pixel per frame of a new twinkle"),
    );
    schema.insert(
        "fade".into(),
        ParameterSpec::float(0.0, 1.0, 0.85, "Per-frame brightness retained by lit pixels"),
    );
    schema.insert(
        "saturation".into(),
        ParameterSpec::float(0.0, 1.0, 0.0, "Twinkle color saturation (0 is white)"),
    );
    schema
}

impl Animation for Sparkle {
    fn metadata(&self) -> AnimationMetadata {
        AnimationMetadata {
            name: "sparkle".into(),
            description: "Random twinkles fading over a dark backdrop".into(),
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

    fn on_start(&mut self) -> Result<()> {
        self.buffer = self.geometry.blank_frame();
        Ok(())
    }

    fn generate_frame(&mut self, _elapsed: Duration, _frame_count: u64) -> Result<Frame> {
        let density = param_f64(&self.params, "density").unwrap_or(0.02).clamp(0.0, 1.0);
        let fade = param_f64(&self.params, "fade").unwrap_or(0.85).clamp(0.0, 1.0);
        let saturation = param_f64(&self.params, "saturation").unwrap_or(0.0);

        let mut rng = rand::rng();
        for pixel in &mut self.buffer {
            *pixel = pixel.scaled(fade);
            if rng.random::<f64>() < density {
                let hue = rng.random::<f64>();
                *pixel = Rgb::from_hsv(hue, saturation, 1.0);
            }
        }
        Ok(self.buffer.clone())
    }
}
