//! Step definitions for authentication against the stub API.

use crate::bdd::fixtures::{TestWorld, strip_quotes};
use anyhow::{Result, bail};
use rstest_bdd_macros::{given, when};

#[given("I have a valid access token as {role:string} with {email:string}")]
fn valid_access_token(world: &TestWorld, role: String, email: String) -> Result<()> {
    let role = strip_quotes(&role);
    let email = strip_quotes(&email);
    world.with_scenario(|scenario| scenario.auth().have_valid_access_token(role, Some(email)))??;
    Ok(())
}

#[given("I am unauthorized")]
fn unauthorized(world: &TestWorld) -> Result<()> {
    world.with_scenario(|scenario| scenario.auth().unauthorized())?;
    Ok(())
}

#[when("I login with username {username:string} and password {password:string}")]
fn login(world: &TestWorld, username: String, password: String) -> Result<()> {
    let username = strip_quotes(&username);
    let password = strip_quotes(&password);
    world.with_scenario(|scenario| {
        scenario
            .auth()
            .login_with_password_grant(username, password)
    })??;
    Ok(())
}

#[when("I try to authorize with email {email:string}")]
fn try_authorize(world: &TestWorld, email: String) -> Result<()> {
    let email = strip_quotes(&email);
    match world.with_scenario(|scenario| scenario.auth().authorized_with_email(email))? {
        Ok(token) => bail!("authorization unexpectedly succeeded with token {token}"),
        Err(err) => {
            world.step_error.set(err.to_string());
            Ok(())
        }
    }
}
