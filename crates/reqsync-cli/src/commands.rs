use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use colored::Colorize;

use reqsync_delta::DeltaScript;
use reqsync_store::{FsDriver, ObjectStore};
use reqsync_sync::{pull_backend_project, DocumentRepository, DriverRepository, WorkspaceChange};
use reqsync_types::{BackendProject, Project};
use reqsync_vcs::{Change, CommitOutcome, MergeStatus, StoreRemote, Vcs, VcsConfig};

use crate::cli::*;
use crate::config::Config;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = &cli.config;
    match cli.command {
        Command::Delta(args) => cmd_delta(args),
        Command::Pull(args) => cmd_pull(&Context::load(config)?, args).await,
        Command::Commit(args) => cmd_commit(&Context::load(config)?, args).await,
        Command::Push(args) => cmd_push(&Context::load(config)?, args).await,
        Command::Log(args) => cmd_log(&Context::load(config)?, args, &cli.format),
        Command::Branches(args) => cmd_branches(&Context::load(config)?, args, &cli.format),
        Command::RemoteBranches(args) => {
            cmd_remote_branches(&Context::load(config)?, args, &cli.format).await
        }
        Command::Access(args) => cmd_access(&Context::load(config)?, args),
    }
}

/// Drivers and repository opened from a [`Config`].
struct Context {
    config: Config,
    local: Arc<FsDriver>,
    remote: Arc<StoreRemote>,
    repo: DriverRepository,
}

impl Context {
    fn load(path: &Path) -> anyhow::Result<Self> {
        Self::open(Config::load(path)?)
    }

    fn open(config: Config) -> anyhow::Result<Self> {
        let local = Arc::new(
            FsDriver::open(&config.data_dir)
                .with_context(|| format!("opening {}", config.data_dir.display()))?,
        );
        let remote_driver = FsDriver::open(&config.remote_dir)
            .with_context(|| format!("opening {}", config.remote_dir.display()))?;
        let remote = Arc::new(StoreRemote::new(Arc::new(remote_driver)));
        let repo = DriverRepository::new(local.clone());
        Ok(Self {
            config,
            local,
            remote,
            repo,
        })
    }

    fn vcs(&self) -> Vcs {
        Vcs::new(
            ObjectStore::with_options(self.local.clone(), self.config.store.clone()),
            self.local.clone(),
            self.remote.clone(),
            VcsConfig::with_author(&self.config.author),
        )
    }

    fn bound_vcs(&self, project_id: &str) -> anyhow::Result<(Vcs, BackendProject)> {
        let mut vcs = self.vcs();
        let project = vcs
            .load_backend_project(project_id)
            .with_context(|| format!("project {project_id} has not been pulled"))?;
        Ok((vcs, project))
    }
}

fn cmd_delta(args: DeltaArgs) -> anyhow::Result<()> {
    match args.action {
        DeltaAction::Diff {
            source,
            target,
            output,
            chunk_size,
        } => {
            let source = read(&source)?;
            let target = read(&target)?;
            let script = reqsync_delta::diff(&source, &target, chunk_size)?;
            let bytes = script.to_bytes()?;
            std::fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;
            println!(
                "{} {} ops, {} bytes copied, {} bytes inserted ({} byte delta)",
                "✓".green().bold(),
                script.ops.len(),
                script.copied_bytes().to_string().cyan(),
                script.inserted_bytes().to_string().yellow(),
                bytes.len()
            );
        }
        DeltaAction::Patch {
            source,
            delta,
            output,
        } => {
            let source = read(&source)?;
            let script = DeltaScript::from_bytes(&read(&delta)?)?;
            let target = reqsync_delta::patch(&source, &script)?;
            std::fs::write(&output, &target).with_context(|| format!("writing {}", output.display()))?;
            println!("{} Wrote {} bytes to {}", "✓".green().bold(), target.len(), output.display());
        }
    }
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

async fn cmd_pull(ctx: &Context, args: PullArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.project)
        .with_context(|| format!("reading {}", args.project.display()))?;
    let backend_project: BackendProject = serde_json::from_str(&text)?;
    let remote_projects: Vec<Project> = ctx
        .repo
        .all_projects()
        .await?
        .into_iter()
        .filter(Project::is_remote)
        .collect();

    let mut vcs = ctx.vcs();
    let summary = pull_backend_project(&mut vcs, &backend_project, &remote_projects, &ctx.repo).await?;

    let verb = if summary.project_created { "Created" } else { "Using" };
    println!("{verb} project {} ({})", summary.project.name.bold(), summary.project.id.dimmed());
    match &summary.pulled {
        Some(outcome) if outcome.status == MergeStatus::FastForward => println!(
            "{} Fast-forwarded {}: {} commits, {} updated, {} removed",
            "✓".green().bold(),
            vcs.current_branch().yellow(),
            outcome.commits_received,
            outcome.upsert.len(),
            outcome.remove.len()
        ),
        Some(_) => println!("{} {} is up to date", "✓".green().bold(), vcs.current_branch().yellow()),
        None => println!("Remote project is empty, nothing to pull"),
    }
    let state = match summary.workspace_change {
        WorkspaceChange::Created => "created".green(),
        WorkspaceChange::Corrected => "updated".yellow(),
        WorkspaceChange::Unchanged => "unchanged".dimmed(),
    };
    println!("Workspace {} {}", summary.workspace.name.bold(), state);
    Ok(())
}

async fn cmd_commit(ctx: &Context, args: CommitArgs) -> anyhow::Result<()> {
    let (mut vcs, project) = ctx.bound_vcs(&args.project)?;
    let documents = ctx.repo.documents_in(&project.root_document_id).await?;

    let status = vcs.status(&documents)?;
    for entry in status.unstaged.iter().filter(|e| e.change == Change::Deleted) {
        vcs.stage_deletion(&entry.key)?;
    }
    vcs.stage(&documents)?;

    match vcs.commit(&args.message)? {
        CommitOutcome::Committed(commit) => {
            println!(
                "[{} {}] {}",
                vcs.current_branch().yellow(),
                commit.id.short().dimmed(),
                commit.message
            );
            println!("  {} documents", commit.state.len());
        }
        CommitOutcome::NothingToCommit => println!("Nothing to commit, working set clean."),
    }
    Ok(())
}

async fn cmd_push(ctx: &Context, args: ProjectArgs) -> anyhow::Result<()> {
    let (mut vcs, _) = ctx.bound_vcs(&args.project)?;
    let outcome = vcs.push().await?;
    match outcome.status {
        MergeStatus::FastForward => println!(
            "{} Pushed {} commits to {}",
            "✓".green().bold(),
            outcome.commits_sent,
            vcs.current_branch().yellow()
        ),
        MergeStatus::UpToDate => println!("{} {} is up to date", "✓".green().bold(), vcs.current_branch().yellow()),
    }
    Ok(())
}

fn cmd_log(ctx: &Context, args: LogArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (vcs, _) = ctx.bound_vcs(&args.project)?;
    let history: Vec<_> = vcs.history()?.into_iter().take(args.limit).collect();

    if let OutputFormat::Json = format {
        let entries: Vec<serde_json::Value> = history
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id.to_hex(),
                    "parent": c.parent.map(|p| p.to_hex()),
                    "author": c.author,
                    "message": c.message,
                    "created": c.created,
                    "documents": c.state.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No commits on {}.", vcs.current_branch().yellow());
    }
    for commit in &history {
        if args.oneline {
            println!("{} {}", commit.id.short().yellow(), commit.message);
            continue;
        }
        let when = chrono::DateTime::from_timestamp_millis(commit.created)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| commit.created.to_string());
        println!("{} {}", "commit".yellow(), commit.id.to_hex().yellow());
        println!("Author: {}", commit.author);
        println!("Date:   {when}");
        println!("\n    {}\n", commit.message);
    }
    Ok(())
}

fn cmd_branches(ctx: &Context, args: ProjectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (vcs, _) = ctx.bound_vcs(&args.project)?;
    print_branches(&vcs.branches()?, Some(vcs.current_branch()), format)
}

async fn cmd_remote_branches(ctx: &Context, args: ProjectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (vcs, _) = ctx.bound_vcs(&args.project)?;
    print_branches(&vcs.get_remote_branches().await?, None, format)
}

fn print_branches(names: &[String], current: Option<&str>, format: &OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(names)?);
        return Ok(());
    }
    if names.is_empty() {
        println!("No branches.");
    }
    for name in names {
        if Some(name.as_str()) == current {
            println!("* {}", name.green().bold());
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn cmd_access(ctx: &Context, args: AccessArgs) -> anyhow::Result<()> {
    match args.action {
        AccessAction::Grant { team } => {
            ctx.remote.grant(&team)?;
            println!("{} Granted {}", "✓".green().bold(), team.bold());
        }
        AccessAction::Revoke { team } => {
            ctx.remote.revoke(&team)?;
            println!("Revoked {}", team.bold());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use reqsync_types::{Request, Team};

    struct Fixture {
        _dir: tempfile::TempDir,
        config: std::path::PathBuf,
        project: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("reqsync.toml");
        let toml = format!(
            "data_dir = {:?}\nremote_dir = {:?}\nauthor = \"jane\"\n",
            dir.path().join("data"),
            dir.path().join("remote")
        );
        std::fs::write(&config, toml).unwrap();

        let project = dir.path().join("project.json");
        let backend_project = BackendProject {
            id: "prj_1".into(),
            name: "Petstore".into(),
            root_document_id: "wrk_1".into(),
            team: Team {
                id: "team_1".into(),
                name: "Platform".into(),
            },
        };
        std::fs::write(&project, serde_json::to_vec(&backend_project).unwrap()).unwrap();
        Fixture {
            _dir: dir,
            config,
            project,
        }
    }

    async fn run(fixture: &Fixture, args: &[&str]) -> anyhow::Result<()> {
        let config = fixture.config.to_str().unwrap();
        let argv = ["reqsync", "--config", config].into_iter().chain(args.iter().copied());
        run_command(Cli::try_parse_from(argv).unwrap()).await
    }

    #[tokio::test]
    async fn pull_commit_push_roundtrip() {
        let fx = fixture();
        let project = fx.project.to_str().unwrap();

        run(&fx, &["access", "grant", "team_1"]).await.unwrap();
        run(&fx, &["pull", project]).await.unwrap();

        let ctx = Context::load(&fx.config).unwrap();
        ctx.repo
            .create_request(Request::new("wrk_1").named("List pets"))
            .await
            .unwrap();

        run(&fx, &["commit", "prj_1", "-m", "Add pets"]).await.unwrap();
        run(&fx, &["push", "prj_1"]).await.unwrap();
        run(&fx, &["log", "prj_1"]).await.unwrap();

        let (vcs, _) = ctx.bound_vcs("prj_1").unwrap();
        assert_eq!(vcs.history().unwrap().len(), 1);
        assert_eq!(vcs.get_remote_branches().await.unwrap(), vec!["master"]);
    }

    #[tokio::test]
    async fn pull_without_access_reports_permission() {
        let fx = fixture();
        let err = run(&fx, &["pull", fx.project.to_str().unwrap()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no longer have permission"));
    }

    #[tokio::test]
    async fn commands_need_a_pulled_project() {
        let fx = fixture();
        assert!(run(&fx, &["branches", "prj_unknown"]).await.is_err());
    }

    #[test]
    fn delta_files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        let target = dir.path().join("b.txt");
        let delta = dir.path().join("ab.delta");
        let output = dir.path().join("b2.txt");
        std::fs::write(&source, "The quick brown fox jumps over the lazy dog.").unwrap();
        std::fs::write(&target, "The quick brown cat jumps over the lazy dog!").unwrap();

        let path = |p: &std::path::Path| p.to_path_buf();
        cmd_delta(DeltaArgs {
            action: DeltaAction::Diff {
                source: path(&source),
                target: path(&target),
                output: path(&delta),
                chunk_size: 5,
            },
        })
        .unwrap();
        cmd_delta(DeltaArgs {
            action: DeltaAction::Patch {
                source: path(&source),
                delta: path(&delta),
                output: path(&output),
            },
        })
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&target).unwrap());
    }
}
