//! A cache of the shader programs able to render each shading model.

use crate::context::GraphicsContext;
use crate::resource::{Material, ShaderProgram, ShadingModel};
use std::collections::HashMap;

/// The shader cache.
///
/// It owns every registered program. Several shading models may share one program:
/// the lit program typically renders all the Phong-style materials.
#[derive(Default)]
pub struct ShaderCache {
    programs: Vec<ShaderProgram>,
    models: HashMap<ShadingModel, usize>,
}

impl ShaderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `program` and uses it for `model`.
    ///
    /// Returns `false`, dropping `program`, if `model` already has a program.
    pub fn register_program(&mut self, model: ShadingModel, program: ShaderProgram) -> bool {
        if self.models.contains_key(&model) {
            log::warn!("A program is already registered for {:?}.", model);
            return false;
        }

        self.programs.push(program);
        let _ = self.models.insert(model, self.programs.len() - 1);
        true
    }

    /// Uses the program already registered for `existing` for `model` too.
    ///
    /// Returns `false` if `existing` has no program in this cache or if `model`
    /// already has one.
    pub fn register_shared(&mut self, model: ShadingModel, existing: ShadingModel) -> bool {
        if self.models.contains_key(&model) {
            return false;
        }

        match self.models.get(&existing).copied() {
            Some(index) => {
                let _ = self.models.insert(model, index);
                true
            }
            None => false,
        }
    }

    /// The program rendering `model`, if any.
    pub fn get(&self, model: ShadingModel) -> Option<&ShaderProgram> {
        self.models.get(&model).map(|i| &self.programs[*i])
    }

    /// The program rendering `model`, if any.
    pub fn get_mut(&mut self, model: ShadingModel) -> Option<&mut ShaderProgram> {
        let index = *self.models.get(&model)?;
        self.programs.get_mut(index)
    }

    /// The program rendering `material`, if any.
    pub fn get_for(&self, material: &Material) -> Option<&ShaderProgram> {
        self.get(material.shading_model())
    }

    pub fn contains(&self, model: ShadingModel) -> bool {
        self.models.contains_key(&model)
    }

    /// Number of distinct programs owned by the cache.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Deletes every program and empties the cache.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        for program in &mut self.programs {
            program.release(ctx);
        }
        self.programs.clear();
        self.models.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lambertian, ProgramLayout, Solid};

    fn program(label: &str) -> ShaderProgram {
        ShaderProgram::new(label, ProgramLayout::new())
    }

    #[test]
    fn unregistered_models_have_no_program() {
        let cache = ShaderCache::new();
        assert!(cache.get(ShadingModel::Phong).is_none());
        assert!(cache
            .get_for(&Material::Solid(Solid::default()))
            .is_none());
    }

    #[test]
    fn a_model_is_registered_once() {
        let mut cache = ShaderCache::new();
        assert!(cache.register_program(ShadingModel::Phong, program("first")));
        assert!(!cache.register_program(ShadingModel::Phong, program("second")));
        assert_eq!(cache.get(ShadingModel::Phong).unwrap().label(), "first");
        assert_eq!(cache.program_count(), 1);
    }

    #[test]
    fn shared_programs_resolve_to_the_same_instance() {
        let mut cache = ShaderCache::new();
        assert!(cache.register_program(ShadingModel::Phong, program("lit")));
        assert!(cache.register_shared(ShadingModel::Lambertian, ShadingModel::Phong));
        assert!(!cache.register_shared(ShadingModel::Solid, ShadingModel::SolidPointLine));

        let lambertian = cache
            .get_for(&Material::Lambertian(Lambertian::default()))
            .unwrap();
        assert!(std::ptr::eq(
            lambertian,
            cache.get(ShadingModel::Phong).unwrap()
        ));
        assert_eq!(cache.program_count(), 1);
    }
}
