//! Parameter template builder.
//!
//! Turns a [`TargetSpec`] into:
//!
//! - a projection-string [`Template`] with one placeholder per unknown sub-value
//! - the initial unknown vector (projection unknowns first, in template order,
//!   then free modifiers in `k_0, x_0, y_0, z_0` order)
//! - an identifier per unknown
//! - a [`ModifierLayout`] telling where each modifier comes from
//!
//! Parameters are emitted in lexicographic name order, sub-values by index.

use crate::domain::{Modifier, ModifierValue, Modifiers, ParamSlot, ParamValue, TargetSpec};

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    /// Index into the unknown vector.
    Slot(usize),
}

/// Projection string skeleton with positional placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pieces: Vec<Piece>,
    slots: usize,
}

impl Template {
    fn push_text(&mut self, text: &str) {
        match self.pieces.last_mut() {
            Some(Piece::Text(last)) => last.push_str(text),
            _ => self.pieces.push(Piece::Text(text.to_string())),
        }
    }

    fn push_slot(&mut self) -> usize {
        let idx = self.slots;
        self.pieces.push(Piece::Slot(idx));
        self.slots += 1;
        idx
    }

    /// Number of placeholders.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Substitute `values` (at least `slot_count()` of them) into the template.
    pub fn render(&self, values: &[f64]) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Slot(idx) => out.push_str(&values[*idx].to_string()),
            }
        }
        out
    }

    #[cfg(test)]
    fn slot_indices(&self) -> Vec<usize> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Slot(idx) => Some(*idx),
                Piece::Text(_) => None,
            })
            .collect()
    }
}

/// What an entry of the unknown vector stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownId {
    Param(ParamSlot),
    Modifier(Modifier),
}

impl UnknownId {
    /// `name`, `name.index` or the modifier name.
    pub fn identifier(&self) -> String {
        match self {
            UnknownId::Param(slot) => slot.identifier(),
            UnknownId::Modifier(m) => m.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierSource {
    Fixed(f64),
    /// Index into the unknown vector.
    Free(usize),
}

/// Where each modifier's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierLayout {
    sources: [(Modifier, ModifierSource); 4],
}

impl ModifierLayout {
    /// Resolve modifier values for candidate vector `x`.
    pub fn resolve(&self, x: &[f64]) -> Modifiers {
        let mut out = Modifiers::default();
        for (modifier, source) in self.sources {
            let value = match source {
                ModifierSource::Fixed(v) => v,
                ModifierSource::Free(idx) => x[idx],
            };
            out.set(modifier, value);
        }
        out
    }

    pub fn source(&self, modifier: Modifier) -> ModifierSource {
        self.sources
            .iter()
            .find(|(m, _)| *m == modifier)
            .map(|(_, s)| *s)
            .unwrap_or(ModifierSource::Fixed(modifier.default_value()))
    }
}

/// Output of [`build_template`].
#[derive(Debug, Clone)]
pub struct TemplateBuild {
    pub template: Template,
    pub initial: Vec<f64>,
    pub unknowns: Vec<UnknownId>,
    pub modifiers: ModifierLayout,
}

impl TemplateBuild {
    /// No unknowns: the solver can be skipped.
    pub fn is_fully_known(&self) -> bool {
        self.initial.is_empty()
    }

    /// Projection part of a candidate vector.
    pub fn projection_values<'x>(&self, x: &'x [f64]) -> &'x [f64] {
        &x[..self.template.slot_count()]
    }
}

pub fn build_template(spec: &TargetSpec) -> TemplateBuild {
    let mut template = Template::default();
    let mut initial = Vec::new();
    let mut unknowns = Vec::new();

    for (i, (name, values)) in spec.params().enumerate() {
        if i > 0 {
            template.push_text(" ");
        }
        template.push_text("+");
        template.push_text(name);
        if values.is_empty() {
            continue;
        }
        template.push_text("=");
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                template.push_text(",");
            }
            match value {
                ParamValue::Known(text) => template.push_text(text),
                ParamValue::Unknown(guess) => {
                    template.push_slot();
                    initial.push(*guess);
                    unknowns.push(UnknownId::Param(ParamSlot::new(name, index)));
                }
            }
        }
    }

    let sources = Modifier::ALL.map(|modifier| {
        let source = match spec.modifiers.get(modifier) {
            None => ModifierSource::Fixed(modifier.default_value()),
            Some(ModifierValue::Known(v)) => ModifierSource::Fixed(v),
            Some(ModifierValue::Unknown(guess)) => {
                initial.push(guess);
                unknowns.push(UnknownId::Modifier(modifier));
                ModifierSource::Free(initial.len() - 1)
            }
        };
        (modifier, source)
    });

    TemplateBuild {
        template,
        initial,
        unknowns,
        modifiers: ModifierLayout { sources },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_target;

    fn build(params: &[&str], modifiers: &[&str]) -> TemplateBuild {
        build_template(&parse_target(params, modifiers).unwrap())
    }

    #[test]
    fn emits_sorted_parameters_with_placeholders() {
        let b = build(
            &["+proj=tmerc", "+y_0~-5e6", "+ellps=krass", "+x_0~0", "+no_defs", "+towgs84=~25,-141,~-80"],
            &[],
        );
        assert_eq!(b.template.slot_count(), 4);
        assert_eq!(
            b.template.render(&[1.0, 2.0, 3.0, 4.0]),
            "+ellps=krass +no_defs +proj=tmerc +towgs84=1,-141,2 +x_0=3 +y_0=4"
        );
        assert_eq!(b.initial, vec![25.0, -80.0, 0.0, -5e6]);
        let ids: Vec<String> = b.unknowns.iter().map(UnknownId::identifier).collect();
        assert_eq!(ids, ["towgs84", "towgs84.2", "x_0", "y_0"]);
    }

    #[test]
    fn placeholders_are_injective() {
        let b = build(&["+a~1", "+b=~1,~2,~3", "+c=x", "+d~4"], &["--z_0~0", "--k_0~1"]);
        let slots = b.template.slot_indices();
        assert_eq!(slots, (0..b.template.slot_count()).collect::<Vec<_>>());

        let mut ids: Vec<String> = b.unknowns.iter().map(UnknownId::identifier).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(total, b.initial.len());
    }

    #[test]
    fn free_modifiers_follow_projection_unknowns() {
        let b = build(&["+proj=tmerc", "+x_0~0"], &["--z_0~2", "--k_0~1", "--y_0=5"]);
        assert_eq!(b.initial, vec![0.0, 1.0, 2.0]);
        assert_eq!(b.modifiers.source(Modifier::K0), ModifierSource::Free(1));
        assert_eq!(b.modifiers.source(Modifier::Z0), ModifierSource::Free(2));
        assert_eq!(b.modifiers.source(Modifier::Y0), ModifierSource::Fixed(5.0));
        assert_eq!(b.modifiers.source(Modifier::X0), ModifierSource::Fixed(0.0));

        let m = b.modifiers.resolve(&[10.0, 0.5, -1.0]);
        assert_eq!((m.k_0, m.x_0, m.y_0, m.z_0), (0.5, 0.0, 5.0, -1.0));
    }

    #[test]
    fn fully_known_spec_has_no_unknowns() {
        let b = build(&["+proj=longlat", "+datum=WGS84"], &["--x_0=1"]);
        assert!(b.is_fully_known());
        assert_eq!(b.template.render(&[]), "+datum=WGS84 +proj=longlat");
        assert_eq!(b.modifiers.resolve(&[]).x_0, 1.0);
    }
}
