use std::collections::BTreeMap;

pub const CUSTOM_NAME_KEY: &str = "llb.customname";

/// Per-operation settings recorded in the op's `OpMetadata`.
///
/// Ops never carry a platform, so the engine resolves images and runs for
/// its own host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub ignore_cache: bool,
    pub description: BTreeMap<String, String>,
}

impl Constraints {
    pub fn custom_name(&self) -> Option<&str> {
        self.description.get(CUSTOM_NAME_KEY).map(String::as_str)
    }
}

/// Mutates the constraints of the operation it is applied to.
///
/// Implemented for every `Fn(&mut Constraints)`, so plain closures can be
/// handed to sources, runs and file operations alike.
pub trait ConstraintsOpt {
    fn set_constraints_option(&self, constraints: &mut Constraints);
}

impl<F> ConstraintsOpt for F
where
    F: Fn(&mut Constraints),
{
    fn set_constraints_option(&self, constraints: &mut Constraints) {
        self(constraints)
    }
}

pub fn custom_name(name: impl Into<String>) -> impl ConstraintsOpt {
    let name = name.into();
    move |c: &mut Constraints| {
        c.description
            .insert(CUSTOM_NAME_KEY.to_string(), name.clone());
    }
}

pub fn ignore_cache() -> impl ConstraintsOpt {
    |c: &mut Constraints| c.ignore_cache = true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_constraints_opt() {
        let mut constraints = Constraints::default();
        let opt = |c: &mut Constraints| c.ignore_cache = true;
        opt.set_constraints_option(&mut constraints);
        assert!(constraints.ignore_cache);
    }

    #[test]
    fn test_custom_name() {
        let mut constraints = Constraints::default();
        custom_name("load files").set_constraints_option(&mut constraints);
        assert_eq!(constraints.custom_name(), Some("load files"));
    }
}
