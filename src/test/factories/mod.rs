//! Factory methods for synthetic universes.

use crate::{
    analysis::MethodRelationMap,
    assembly::Instruction,
    config::IgnoredCalls,
    metadata::{AssemblyDef, MethodDef, MethodId, MethodRef, TypeDef, Universe},
};

/// Looks up a method by canonical signature, panicking with the signature if it is absent.
pub fn id(universe: &Universe, signature: &str) -> MethodId {
    universe
        .find_method(signature)
        .unwrap_or_else(|| panic!("method not found: {signature}"))
}

/// Builds the relation map of `universe` without ignored calls.
pub fn relations(universe: &Universe) -> MethodRelationMap {
    MethodRelationMap::build(universe, &IgnoredCalls::new())
}

/// Creates a layered call graph.
///
/// `Bench.Layer0` holds `width` platform-invoke methods. Every method `M{j}` of
/// `Bench.Layer{l}` calls `M{j}` and `M{(j + 1) % width}` of the layer below. A virtual
/// `Draw` hierarchy with one override per layer is attached, and the override in the top
/// layer calls into `Layer0`, so propagation also exercises the inheritance cascade.
pub fn layered_universe(layers: usize, width: usize) -> Universe {
    let mut assembly = AssemblyDef::new("Bench")
        .with_type(TypeDef::class("Bench", "Shape").with_method(MethodDef::new("Draw").as_virtual()));

    for layer in 0..layers {
        let name = format!("Layer{layer}");
        let mut ty = TypeDef::class("Bench", &name).with_base("Bench.Shape");

        for j in 0..width {
            let method = MethodDef::new(&format!("M{j}"));
            let method = if layer == 0 {
                method.as_static().as_pinvoke()
            } else {
                let below = format!("Bench.Layer{}", layer - 1);
                method.body(vec![
                    Instruction::call(0, MethodRef::new(&below, &format!("M{j}"))),
                    Instruction::call(5, MethodRef::new(&below, &format!("M{}", (j + 1) % width))),
                ])
            };
            ty = ty.with_method(method);
        }

        let mut draw = MethodDef::new("Draw").as_virtual();
        if layer + 1 == layers {
            draw = draw.body(vec![Instruction::call(0, MethodRef::new("Bench.Layer0", "M0"))]);
        }
        assembly = assembly.with_type(ty.with_method(draw));
    }

    Universe::new(vec![assembly])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_universe_shape() {
        let universe = layered_universe(3, 4);
        assert_eq!(universe.types().len(), 4);
        assert_eq!(universe.methods().len(), 1 + 3 * 5);

        let map = relations(&universe);
        assert_eq!(map.stats().call_edges, 2 * 4 * 2 + 1);
        assert_eq!(map.stats().override_edges, 3);
    }
}
