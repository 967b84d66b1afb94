//! Assertion helpers for scenario cleanup behavioural tests.

use rstest_bdd_macros::then;
use stepkit::scenario::ScenarioReport;

use super::StepResult;
use super::state::{CleanupState, parse_names};
use super::steps::browser;

fn report(cleanup_state: &CleanupState) -> StepResult<ScenarioReport> {
    cleanup_state
        .report
        .get()
        .ok_or_else(|| String::from("scenario report should be recorded"))
}

fn display_option(view_mode: &str) -> String {
    format!("display_modes_custom[{view_mode}]")
}

#[then("the scenario passes")]
fn scenario_passes(cleanup_state: &CleanupState) -> StepResult<()> {
    report(cleanup_state)?
        .into_result()
        .map_err(|error| format!("expected the scenario to pass: {error}"))
}

#[then("the scenario fails at the step recording {name}")]
fn scenario_fails_at(cleanup_state: &CleanupState, name: String) -> StepResult<()> {
    let scenario_report = report(cleanup_state)?;
    let failure = scenario_report
        .failed_step
        .as_ref()
        .ok_or_else(|| String::from("expected a failed step"))?;
    if failure.step != format!("the step recording {name}") {
        return Err(format!("unexpected failing step: {}", failure.step));
    }
    if scenario_report.cleanup.is_some() {
        return Err(String::from("cleanup should have succeeded"));
    }
    Ok(())
}

#[then("the undo actions ran as {names}")]
fn undo_actions_ran_as(cleanup_state: &CleanupState, names: String) -> StepResult<()> {
    let expected = parse_names(&names);
    let ran = cleanup_state.ran.get().unwrap_or_default();
    if ran == expected {
        Ok(())
    } else {
        Err(format!("expected undo order {expected:?}, got {ran:?}"))
    }
}

#[then("cleanup reports failures for {names}")]
fn cleanup_reports_failures(cleanup_state: &CleanupState, names: String) -> StepResult<()> {
    let expected = parse_names(&names);
    let scenario_report = report(cleanup_state)?;
    if scenario_report.failed_step.is_some() {
        return Err(String::from("no step should have failed"));
    }
    let cleanup = scenario_report
        .cleanup
        .as_ref()
        .ok_or_else(|| String::from("expected cleanup failures"))?;
    let failed: Vec<String> = cleanup
        .failures
        .iter()
        .map(|failure| failure.operation.clone())
        .collect();
    if failed == expected {
        Ok(())
    } else {
        Err(format!("expected cleanup failures {expected:?}, got {failed:?}"))
    }
}

#[then("the {view_mode} view mode of {bundle} was customized during the scenario")]
fn customized_during(cleanup_state: &CleanupState, view_mode: String, bundle: String) -> StepResult<()> {
    let _ = (view_mode, bundle);
    match cleanup_state.customized_during.get() {
        Some(true) => Ok(()),
        Some(false) => Err(String::from("the view mode was not customized")),
        None => Err(String::from("customization state should be recorded")),
    }
}

#[then("the {view_mode} view mode of {bundle} is no longer customized")]
fn no_longer_customized(cleanup_state: &CleanupState, view_mode: String, bundle: String) -> StepResult<()> {
    let path = format!("admin/structure/types/manage/{bundle}");
    if browser(cleanup_state)?.is_checked(&path, &display_option(&view_mode)) {
        return Err(format!("{view_mode} display of {bundle} is still customized"));
    }
    report(cleanup_state)?
        .into_result()
        .map_err(|error| format!("expected the scenario to pass: {error}"))
}
