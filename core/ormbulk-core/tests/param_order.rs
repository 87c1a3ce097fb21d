// Property test: a translated predicate's bind sites always line up with
// its `?` placeholders, and re-binding them reproduces the statement's
// values in placeholder order.

use ormbulk_core::metadata::{EntityTopology, IdColumn, TableMapping};
use ormbulk_core::sql::{
    BinaryOperator, ColumnStyle, ScalarValue, SqlExpr, bind_params, translate_predicate,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum BindSite {
    Literal(i64),
    Positional,
}

fn bind_site() -> impl Strategy<Value = BindSite> {
    prop_oneof![
        any::<i64>().prop_map(BindSite::Literal),
        Just(BindSite::Positional),
    ]
}

fn topology() -> EntityTopology {
    EntityTopology::new(
        "Foo",
        vec![IdColumn::bigint("id")],
        vec![TableMapping::new("foo", &["id"]).with_property("x", "x")],
    )
    .unwrap()
}

/// Conjunction of `x = <site>` comparisons, positional sites numbered left
/// to right.
fn conjunction(sites: &[BindSite]) -> SqlExpr {
    let mut next_param = 0;
    let mut terms = sites.iter().map(|site| {
        let value = match site {
            BindSite::Literal(v) => SqlExpr::Literal(ScalarValue::Int(*v)),
            BindSite::Positional => {
                let index = next_param;
                next_param += 1;
                SqlExpr::Param(index)
            }
        };
        SqlExpr::binary(SqlExpr::column("x"), BinaryOperator::Eq, value)
    });
    let first = terms.next().expect("at least one site");
    terms.fold(first, |acc, term| {
        SqlExpr::binary(acc, BinaryOperator::And, term)
    })
}

proptest! {
    #[test]
    fn bind_sites_match_placeholders_in_order(sites in prop::collection::vec(bind_site(), 1..16)) {
        let topo = topology();
        let expr = conjunction(&sites);
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Bare).unwrap();

        // One spec per placeholder
        let placeholders = fragment.sql.matches('?').count();
        prop_assert_eq!(placeholders, sites.len());
        prop_assert_eq!(fragment.params.len(), sites.len());

        // Supply a distinct value per positional site
        let positional = sites
            .iter()
            .filter(|s| matches!(s, BindSite::Positional))
            .count();
        let supplied: Vec<ScalarValue> =
            (0..positional).map(|i| ScalarValue::Int(1_000_000 + i as i64)).collect();
        let binds = bind_params(&fragment.params, &supplied).unwrap();

        // Re-binding reproduces each site's value in placeholder order
        let mut next_param = 0;
        for (bind, site) in binds.iter().zip(&sites) {
            match site {
                BindSite::Literal(v) => prop_assert_eq!(bind, &ScalarValue::Int(*v)),
                BindSite::Positional => {
                    prop_assert_eq!(bind, &supplied[next_param]);
                    next_param += 1;
                }
            }
        }
    }

    #[test]
    fn out_of_range_positional_is_rejected(extra in 1usize..8) {
        let topo = topology();
        let expr = SqlExpr::binary(
            SqlExpr::column("x"),
            BinaryOperator::Eq,
            SqlExpr::Param(extra),
        );
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Bare).unwrap();
        // Only `extra` values supplied, so index `extra` is one past the end
        let supplied: Vec<ScalarValue> = (0..extra).map(|i| ScalarValue::Int(i as i64)).collect();
        prop_assert!(bind_params(&fragment.params, &supplied).is_err());
    }
}
