//! Step definitions for requests sent to the stub API and the assertions
//! made on what came back.

use crate::bdd::fixtures::{TestWorld, strip_quotes};
use anyhow::{Context, Result, ensure};
use rstest_bdd_macros::{given, then, when};
use test_support::StubResponse;

#[given("the API answers {status:u16} with:")]
fn api_answers(world: &TestWorld, status: u16, docstring: String) -> Result<()> {
    world.with_server(|server| server.push(StubResponse::new(status, docstring.trim())));
    Ok(())
}

#[when("I retrieve all {entity_type:string}")]
fn retrieve_all(world: &TestWorld, entity_type: String) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    world.with_scenario(|scenario| scenario.api().retrieve_all(entity_type, None))??;
    Ok(())
}

#[when("I retrieve the {entity_type:string} {alias:string}")]
fn retrieve_alias(world: &TestWorld, entity_type: String, alias: String) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    let alias = strip_quotes(&alias);
    world.with_scenario(|scenario| scenario.api().retrieve_alias(entity_type, alias, None))??;
    Ok(())
}

#[when("I add a new {entity_type:string} with values:")]
fn add_with_values(world: &TestWorld, entity_type: String, datatable: Vec<Vec<String>>) -> Result<()> {
    let entity_type = strip_quotes(&entity_type);
    world.with_scenario(|scenario| scenario.api().add(entity_type, &datatable))??;
    Ok(())
}

#[when("I send a {verb:string} request to {url:string}")]
fn send_request(world: &TestWorld, verb: String, url: String) -> Result<()> {
    let verb = strip_quotes(&verb);
    let url = strip_quotes(&url);
    world.with_scenario(|scenario| scenario.api().send(verb, url))??;
    Ok(())
}

#[then("I should receive a {status:u16} JSON response")]
fn receive_json(world: &TestWorld, status: u16) -> Result<()> {
    world.with_scenario(|scenario| scenario.api().should_receive_json(status))??;
    Ok(())
}

#[then("the response should contain {count:usize} records")]
fn contains_records(world: &TestWorld, count: usize) -> Result<()> {
    world.with_scenario(|scenario| scenario.api().should_contain_records(count))??;
    Ok(())
}

#[then("the response field {path:string} should be {value:string}")]
fn field_should_be(world: &TestWorld, path: String, value: String) -> Result<()> {
    let path = strip_quotes(&path);
    let value = strip_quotes(&value);
    world.with_scenario(|scenario| scenario.api().field_should("string", path, "be", value))??;
    Ok(())
}

#[then("request {number:usize} was {line:string}")]
fn request_was(world: &TestWorld, number: usize, line: String) -> Result<()> {
    let line = strip_quotes(&line);
    let requests = world.requests();
    let request = number
        .checked_sub(1)
        .and_then(|index| requests.get(index))
        .with_context(|| format!("only {} request(s) were received", requests.len()))?;
    let seen = format!("{} {}", request.method, request.target);
    ensure!(seen == line, "expected request '{line}', got '{seen}'");
    Ok(())
}

#[then("the last request had header {name:string} starting with {prefix:string}")]
fn last_request_header(world: &TestWorld, name: String, prefix: String) -> Result<()> {
    let name = strip_quotes(&name);
    let prefix = strip_quotes(&prefix);
    let requests = world.requests();
    let request = requests.last().context("no request was received")?;
    let value = request
        .header(name)
        .with_context(|| format!("header '{name}' was not sent"))?;
    ensure!(
        value.starts_with(prefix),
        "header '{name}' is '{value}', expected it to start with '{prefix}'"
    );
    Ok(())
}

#[then("the last request had no header {name:string}")]
fn last_request_without_header(world: &TestWorld, name: String) -> Result<()> {
    let name = strip_quotes(&name);
    let requests = world.requests();
    let request = requests.last().context("no request was received")?;
    ensure!(request.header(name).is_none(), "header '{name}' was sent");
    Ok(())
}

#[then("the last request body field {field:string} is {value:string}")]
fn last_request_body_field(world: &TestWorld, field: String, value: String) -> Result<()> {
    let field = strip_quotes(&field);
    let value = strip_quotes(&value);
    let requests = world.requests();
    let request = requests.last().context("no request was received")?;
    let body = request.json();
    let actual = body
        .get(field)
        .with_context(|| format!("request body has no field '{field}': {body}"))?;
    let rendered = actual
        .as_str()
        .map_or_else(|| actual.to_string(), str::to_owned);
    ensure!(rendered == value, "body field '{field}' is '{rendered}', expected '{value}'");
    Ok(())
}

#[then("the step fails mentioning {text:string}")]
fn step_fails(world: &TestWorld, text: String) -> Result<()> {
    let text = strip_quotes(&text);
    let message = world
        .step_error
        .get()
        .context("the step was expected to fail")?;
    ensure!(
        message.contains(text),
        "expected failure mentioning '{text}', got '{message}'"
    );
    Ok(())
}
