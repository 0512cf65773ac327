//! Serialization round-trips for parameter records and symbol tables.

use approx::assert_relative_eq;
use gibbs_core::expression::{Expr, SymbolTable, VariableMap};
use gibbs_core::parameter::{Parameter, ParameterSet};
use gibbs_core::{Conditions, GibbsResult};

fn conditions() -> Conditions {
    let mut conditions = Conditions::default();
    conditions.statevars.insert('T', 600.0);
    conditions
}

#[test]
fn parameter_record_round_trip() -> GibbsResult<()> {
    let mut parameters = ParameterSet::new();
    parameters.define_symbol(
        "GHSERAA",
        Expr::add(
            Expr::constant(-8000.0),
            Expr::mul(Expr::constant(2.5), Expr::state_variable('T')),
        ),
    );
    parameters.add(Parameter::new(
        "LIQUID",
        "G",
        &[&["AA"]],
        0,
        Expr::symbol("GHSERAA"),
    ));
    parameters.add(Parameter::new(
        "LIQUID",
        "L",
        &[&["AA", "BB"]],
        1,
        Expr::constant(-3500.0),
    ));

    let serialized = serde_json::to_string(&parameters).expect("serialize parameter set");
    let restored: ParameterSet = serde_json::from_str(&serialized).expect("parse parameter set");

    let constituents = vec![vec!["AA".to_string()]];
    let expression = restored
        .get("LIQUID", "G", &constituents, 0)
        .expect("end-member record survives");
    let value = expression.evaluate(
        &conditions(),
        &VariableMap::new(),
        restored.symbols(),
        &[],
    )?;
    assert_relative_eq!(value, -8000.0 + 2.5 * 600.0, max_relative = 1e-14);

    let interaction = vec![vec!["BB".to_string(), "AA".to_string()]];
    let orders = restored.orders("LIQUID", "L", &interaction);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].0, 1);
    Ok(())
}

#[test]
fn parameter_records_parse_from_json() -> GibbsResult<()> {
    let records = r#"{
        "parameters": [
            {
                "phase": "BCC_A2",
                "kind": "G",
                "constituents": [["FE"]],
                "order": 0,
                "expression": {
                    "Binary": [
                        "Mul",
                        { "Constant": -2.0 },
                        { "StateVariable": "T" }
                    ]
                }
            }
        ],
        "symbols": {}
    }"#;
    let parameters: ParameterSet = serde_json::from_str(records).expect("parse records");
    let constituents = vec![vec!["FE".to_string()]];
    let expression = parameters
        .get("BCC_A2", "G", &constituents, 0)
        .expect("record present");
    let value = expression.evaluate(
        &conditions(),
        &VariableMap::new(),
        &SymbolTable::new(),
        &[],
    )?;
    assert_relative_eq!(value, -1200.0, max_relative = 1e-14);
    Ok(())
}
