//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::Scenario;
use crate::application::{
    evaluate_commissions, fresh_seed, run_simulation_seeded, ApplicationError, CommissionReport, IoResultExt,
    SimulationResult, ToTermTree,
};
use crate::cli::args::{Cli, Commands, ConfigCommands, RunArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, OutputFormat, Settings};
use crate::domain::{MemberId, PlanRule};
use crate::infrastructure::di::ServiceContainer;

/// Execute the parsed command line.
pub fn execute(cli: &Cli) -> CliResult<()> {
    let dir = working_dir(cli)?;
    let settings = Settings::load(Some(&dir))?;
    let ctx = ServiceContainer::new(settings);

    match &cli.command {
        Some(Commands::Simulate { run, output }) => cmd_simulate(&ctx, run, output.as_deref()),
        Some(Commands::Commissions { run, top }) => cmd_commissions(&ctx, run, *top),
        Some(Commands::Tree { run, depth }) => cmd_tree(&ctx, run, *depth),
        Some(Commands::Member { run, id }) => cmd_member(&ctx, run, *id),
        Some(Commands::Validate { scenario }) => cmd_validate(&ctx, scenario),
        Some(Commands::Plans) => cmd_plans(),
        Some(Commands::Config { command }) => cmd_config(&ctx, command, &dir),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage("no command given, see --help".to_string())),
    }
}

fn working_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.dir {
        Some(dir) if dir.is_dir() => Ok(dir.clone()),
        Some(dir) => Err(CliError::InvalidArgs(format!("not a directory: {}", dir.display()))),
        None => std::env::current_dir().map_err(|e| {
            CliError::Infra(crate::infrastructure::InfraError::io("current directory", e))
        }),
    }
}

fn format_for(ctx: &ServiceContainer, run: &RunArgs) -> OutputFormat {
    if run.json {
        OutputFormat::Json
    } else {
        ctx.settings.format
    }
}

/// Loads the scenario and runs it with the resolved seed and payout cap.
#[instrument(level = "debug", skip(ctx))]
fn simulate(ctx: &ServiceContainer, run: &RunArgs) -> CliResult<(Scenario, SimulationResult)> {
    let scenario = ctx.scenario.load(&run.scenario)?;
    let mut config = scenario.simulation.clone();
    if config.payout_cap.is_none() {
        config.payout_cap = ctx.settings.payout_cap;
    }
    let seed = scenario
        .resolve_seed(run.seed, ctx.settings.seed)
        .unwrap_or_else(fresh_seed);
    debug!(seed, "resolved seed");

    let result = run_simulation_seeded(&config, seed)?;
    Ok((scenario, result))
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        CliError::from(ApplicationError::OperationFailed {
            context: "serialize JSON".to_string(),
            source: Box::new(e),
        })
    })
}

fn cmd_simulate(ctx: &ServiceContainer, run: &RunArgs, output_path: Option<&Path>) -> CliResult<()> {
    let (_, result) = simulate(ctx, run)?;

    if let Some(path) = output_path {
        let json = serde_json::to_string_pretty(&result).with_path_context("serialize result", path)?;
        ctx.scenario.write_output(path, &json)?;
    }
    match format_for(ctx, run) {
        OutputFormat::Json => output::info(&to_json(&result)?),
        OutputFormat::Text => print_simulation(&result),
    }
    if let Some(path) = output_path {
        output::action("Wrote", &path.display());
    }
    Ok(())
}

fn print_simulation(result: &SimulationResult) {
    let summary = &result.summary;
    output::header(&format!("Simulation {}", result.id));
    output::field("plan", &result.config.plan_type);
    if let Some(seed) = result.seed {
        output::field("seed", &seed);
    }
    output::field("members generated", &summary.total_members_generated);
    output::field("depth", &summary.depth);
    output::field("total personal volume", &format!("{:.2}", summary.total_personal_volume));
    output::field("total team volume", &format!("{:.2}", summary.total_team_volume));
    output::field("average team volume", &format!("{:.2}", summary.average_team_volume));

    output::header("Products");
    for (name, share) in &summary.product_distribution {
        output::field(name, &format!("{} ({:.1}%)", share.count, share.percentage));
    }

    output::header("Legs");
    for (leg, stats) in &summary.leg_volume_summary {
        output::field(
            leg,
            &format!(
                "{} members, total {:.2}, avg {:.2}, max {:.2}, min {:.2}",
                stats.count, stats.total_volume, stats.average_volume, stats.max_volume, stats.min_volume
            ),
        );
    }

    output::header("Cycles");
    for cycle in &result.cycles {
        let legs = cycle
            .leg_volumes
            .iter()
            .map(|(leg, volume)| format!("{leg}={volume:.2}"))
            .join(" ");
        output::detail(&format!(
            "cycle {}: {} members, personal {:.2}, team {:.2} [{}]",
            cycle.cycle, cycle.members_generated, cycle.personal_volume, cycle.team_volume, legs
        ));
        if let Some(binary) = &cycle.binary {
            output::detail(&format!(
                "  matched {:.2}, payout {:.2}, flushed {:.2}, carry left {:.2}, carry right {:.2}",
                binary.matched_volume,
                binary.payout_volume,
                binary.cap_flush,
                binary.carry_forward_left,
                binary.carry_forward_right
            ));
        }
    }
}

fn cmd_commissions(ctx: &ServiceContainer, run: &RunArgs, top: usize) -> CliResult<()> {
    let (scenario, result) = simulate(ctx, run)?;
    if scenario.commissions.is_empty() {
        output::warning("scenario defines no commission rules");
    }
    let report = evaluate_commissions(&result.members, &scenario.commissions);

    match format_for(ctx, run) {
        OutputFormat::Json => output::info(&to_json(&report)?),
        OutputFormat::Text => print_commissions(&report, top),
    }
    Ok(())
}

fn print_commissions(report: &CommissionReport, top: usize) {
    output::header("Commission plan");
    output::field("active standard rules", &report.plan.active_standard);
    output::field("active custom rules", &report.plan.active_custom);
    output::field("total percentage", &format!("{:.2}%", report.plan.total_percentage));
    let kinds = report
        .plan
        .standard_kinds
        .iter()
        .map(|k| k.label())
        .join(", ");
    output::field("standard kinds", &kinds);
    output::field("grand total", &format!("{:.2}", report.grand_total));

    output::header(&format!("Top {top} earners"));
    for (id, total) in report.top_earners(top) {
        output::field(&id.to_string(), &format!("{total:.2}"));
    }
}

fn cmd_tree(ctx: &ServiceContainer, run: &RunArgs, depth: Option<usize>) -> CliResult<()> {
    let (_, result) = simulate(ctx, run)?;
    let depth = depth.unwrap_or(ctx.settings.tree_depth);
    output::info(&result.to_term_tree(depth));
    Ok(())
}

fn cmd_member(ctx: &ServiceContainer, run: &RunArgs, id: MemberId) -> CliResult<()> {
    let (scenario, result) = simulate(ctx, run)?;
    let member = result
        .member(id)
        .ok_or_else(|| ApplicationError::MemberNotFound(id.to_string()))?;
    let report = evaluate_commissions(std::slice::from_ref(member), &scenario.commissions);
    let commissions = report.for_member(id).cloned().unwrap_or_default();
    let upline = result.upline(id);
    let downline = result.downline(id);
    let breakdown = result.level_breakdown(id);

    if format_for(ctx, run) == OutputFormat::Json {
        let value = serde_json::json!({
            "member": member,
            "upline": upline,
            "downline_size": downline.len(),
            "level_breakdown": breakdown,
            "commissions": commissions,
        });
        output::info(&to_json(&value)?);
        return Ok(());
    }

    output::header(&format!("Member {id}"));
    output::field("level", &member.level);
    output::field("position", &member.position);
    output::field("join cycle", &member.join_cycle);
    output::field("product", &member.product.as_deref().unwrap_or("-"));
    output::field("personal volume", &format!("{:.2}", member.personal_volume));
    output::field("team volume", &format!("{:.2}", member.team_volume));
    for (leg, volume) in &member.leg_volumes {
        output::field(&format!("leg {leg}"), &format!("{volume:.2}"));
    }
    let upline_names = upline.iter().join(" <- ");
    output::field("upline", &upline_names);
    output::field("downline size", &downline.len());

    output::header("Levels below");
    for (depth, level) in &breakdown {
        output::field(
            &format!("+{depth}"),
            &format!("{} members, personal {:.2}", level.members, level.personal_volume),
        );
    }

    output::header("Commissions");
    for c in &commissions.results {
        output::field(&c.rule_name, &format!("{:.2} ({})", c.amount, c.explanation));
    }
    output::field("total", &format!("{:.2}", commissions.total));
    Ok(())
}

fn cmd_validate(ctx: &ServiceContainer, path: &Path) -> CliResult<()> {
    let scenario = ctx.scenario.load(path)?;
    scenario
        .simulation
        .validate()
        .map_err(ApplicationError::from)?;
    let config = &scenario.simulation;
    output::success(&format!(
        "{}: {} plan, {} members over {} cycles ({} per cycle), {} products",
        path.display(),
        config.plan_type,
        config.max_expected_members,
        config.number_of_cycles,
        config.members_per_cycle(),
        config.products.len()
    ));
    Ok(())
}

fn cmd_plans() -> CliResult<()> {
    let mut problems = 0;
    for rule in PlanRule::all() {
        output::header(&rule.plan_type);
        output::field("description", &rule.description);
        let width = rule
            .fixed_max_children
            .map_or_else(|| "configured".to_string(), |n| n.to_string());
        output::field("max children", &width);
        let positions = if rule.child_positions.is_empty() {
            "1, 2, ...".to_string()
        } else {
            rule.child_positions.join(", ")
        };
        output::field("positions", &positions);
        output::field("fill order", &rule.fill_order);
        output::field("spillover", &rule.spillover);

        let found = rule.validate();
        if found.is_empty() {
            output::success_detail(&"rule consistent");
        }
        for problem in &found {
            output::failure(problem);
        }
        problems += found.len();
    }
    if problems > 0 {
        return Err(CliError::Usage(format!("{problems} plan rule problems")));
    }
    Ok(())
}

fn cmd_config(ctx: &ServiceContainer, command: &ConfigCommands, dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&ctx.settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::field("global", &path.display()),
                None => output::field("global", &"(no config directory)"),
            }
            output::field("local", &local_config_path(dir).display());
        }
    }
    Ok(())
}
