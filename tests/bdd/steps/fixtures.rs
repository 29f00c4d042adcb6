//! Step definitions for entity fixtures and the store behind them.

use crate::bdd::fixtures::{TestWorld, strip_quotes};
use anyhow::{Context, Result, ensure};
use rest_steps::entity::FieldValue;
use rest_steps::table::key_values;
use rstest_bdd_macros::{given, then};
use serde_json::Map;

#[given("an existing {entity_type:string} as {alias:string}")]
fn existing_as(world: &TestWorld, entity_type: String, alias: String) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    let alias = strip_quotes(&alias);
    world.with_scenario(|scenario| {
        scenario
            .fixtures()
            .an_existing_as(entity_type, alias, &Map::new())
    })??;
    Ok(())
}

#[given("an existing {entity_type:string} as {alias:string} with values:")]
fn existing_as_with_values(
    world: &TestWorld,
    entity_type: String,
    alias: String,
    datatable: Vec<Vec<String>>,
) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    let alias = strip_quotes(&alias);
    let values = key_values(&datatable)?;
    world.with_scenario(|scenario| scenario.fixtures().an_existing_as(entity_type, alias, &values))??;
    Ok(())
}

#[given("an existing {entity_type:string} in {collection:string}")]
fn existing_in(world: &TestWorld, entity_type: String, collection: String) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    let collection = strip_quotes(&collection);
    world.with_scenario(|scenario| {
        scenario
            .fixtures()
            .an_existing_in(entity_type, collection, &Map::new())
    })??;
    Ok(())
}

#[given("a clean database")]
fn clean_database(world: &TestWorld) -> Result<()> {
    world.with_scenario(|scenario| scenario.database().clean_database())??;
    Ok(())
}

#[then("the {class:string} with id {id:i64} has {field:string} {value:string}")]
fn stored_field(world: &TestWorld, class: String, id: i64, field: String, value: String) -> Result<()> {
    let class = strip_quotes(&class);
    let field = strip_quotes(&field);
    let value = strip_quotes(&value);
    let entity = world
        .with_scenario(|scenario| scenario.store().find(class, &FieldValue::Integer(id)))??
        .with_context(|| format!("no {class} with id {id} is stored"))?;
    let actual = entity
        .field(field)
        .with_context(|| format!("{class} has no field '{field}'"))?;
    ensure!(
        actual.to_string() == value,
        "{class}.{field} is '{actual}', expected '{value}'"
    );
    Ok(())
}

#[then("{count:usize} {alias:string} entities are registered")]
fn collection_size(world: &TestWorld, count: usize, alias: String) -> Result<()> {
    let alias = strip_quotes(&alias);
    let registered = world.with_scenario(|scenario| {
        scenario
            .aliases()
            .collection(alias)
            .map(|entities| entities.len())
    })??;
    ensure!(
        registered == count,
        "expected {count} entities in '{alias}', found {registered}"
    );
    Ok(())
}
