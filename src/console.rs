//! Line-oriented front end: one command per line, output as plain text.

use crate::chat::{ChatSession, Role, TranscriptEntry};
use crate::error::AppError;
use crate::history::ReportHistory;
use crate::model::Prediction;
use crate::report::{InsightReport, SectionBody};
use crate::service::{AnalysisResult, CostInputs, PredictionService};
use crate::utils::wrap_text;
use crate::workflow::{CostMode, ReportOutcome, WorkflowOrchestrator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

const WIDTH: usize = 78;

const HELP: &str = "\
Commands:
  location <county> <acres>      predict crop yields for a farm
  select <crop>                  choose one of the recommended crops
  mode default|custom            choose how cultivation costs are set
  costs <labor> <seed> <fert>    per-acre costs for custom mode
  analyze                        compute the profit analysis
  report                         save the prediction and fetch insights
  restart                        start a new plan
  crops                          list crops the service can predict
  chat [message]                 show the chat or ask the assistant
  reports                        list saved predictions
  open <n>                       open the report of saved prediction n
  quit";

pub struct Console {
    workflow: WorkflowOrchestrator,
    chat: Arc<ChatSession>,
    history: ReportHistory,
    service: Arc<dyn PredictionService>,
    listed: Vec<Prediction>,
}

impl Console {
    pub fn new(
        workflow: WorkflowOrchestrator,
        chat: Arc<ChatSession>,
        history: ReportHistory,
        service: Arc<dyn PredictionService>,
    ) -> Self {
        Self {
            workflow,
            chat,
            history,
            service,
            listed: Vec::new(),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            match self.execute(&line).await {
                Some(output) => {
                    for out in output {
                        println!("{}", out);
                    }
                }
                None => break,
            }
        }

        self.chat.close();
        Ok(())
    }

    /// Runs one command line. `None` means the user asked to quit.
    pub async fn execute(&mut self, line: &str) -> Option<Vec<String>> {
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map(|(c, r)| (c, r.trim()))
            .unwrap_or((line, ""));

        let result = match command.to_ascii_lowercase().as_str() {
            "" => Ok(Vec::new()),
            "quit" | "exit" => return None,
            "help" => Ok(HELP.lines().map(str::to_string).collect()),
            "location" => self.location(rest).await,
            "select" => self.workflow.select_crop(rest).map(|forecast| {
                vec![format!(
                    "Selected {} (predicted {} per acre)",
                    rest, forecast.prediction_in_acres
                )]
            }),
            "mode" => self.mode(rest),
            "costs" => self.costs(rest),
            "analyze" => self
                .workflow
                .compute_analysis(None)
                .await
                .map(render_analysis),
            "report" => self.workflow.persist_and_report().await.map(render_outcome),
            "restart" => {
                self.workflow.restart();
                Ok(vec!["Started a new plan.".to_string()])
            }
            "crops" => self.service.list_crops().await.map(|crops| {
                wrap_text(&format!("Supported crops: {}", crops.join(", ")), WIDTH)
            }),
            "chat" => self.chat(rest).await,
            "reports" => self.reports().await,
            "open" => self.open(rest).await,
            other => Ok(vec![format!("Unknown command {:?}; try help", other)]),
        };

        Some(result.unwrap_or_else(|e| {
            match &e {
                AppError::Network(_) => error!("{}", e),
                AppError::Persistence(_) => warn!("{}", e),
                _ => {}
            }
            vec![format!("Error: {}", e)]
        }))
    }

    async fn location(&mut self, args: &str) -> Result<Vec<String>, AppError> {
        let (county, size) = args.rsplit_once(char::is_whitespace).ok_or_else(|| {
            AppError::Validation("usage: location <county> <acres>".into())
        })?;
        let size: f64 = size
            .parse()
            .map_err(|_| AppError::Validation(format!("farm size {:?} is not a number", size)))?;

        let recommendations = self.workflow.submit_location(county, size).await?;
        if recommendations.is_empty() {
            return Ok(vec![format!(
                "No crop recommendations for {}. Try another county or restart.",
                county.trim()
            )]);
        }

        let mut out = vec![format!("Recommended crops for {} ({} acres):", county.trim(), size)];
        for (crop, forecast) in recommendations {
            let price = forecast
                .market_price
                .map(|p| format!(", market price {:.2}", p))
                .unwrap_or_default();
            out.push(format!(
                "  {:<14} {:.2} per acre{}",
                crop, forecast.prediction_in_acres, price
            ));
        }
        Ok(out)
    }

    fn mode(&mut self, args: &str) -> Result<Vec<String>, AppError> {
        let mode: CostMode = args.parse()?;
        self.workflow.choose_cost_mode(mode)?;
        Ok(vec![match mode {
            CostMode::Default => "Using optimum costs. Run analyze.".to_string(),
            CostMode::Custom => "Enter costs <labor> <seed> <fertilizer>, then analyze.".to_string(),
        }])
    }

    fn costs(&mut self, args: &str) -> Result<Vec<String>, AppError> {
        let fields: Vec<&str> = args.split_whitespace().collect();
        let [labor, seed, fertilizer] = fields.as_slice() else {
            return Err(AppError::Validation(
                "usage: costs <labor> <seed> <fertilizer>".into(),
            ));
        };
        let inputs = CostInputs::parse(labor, seed, fertilizer)?;
        self.workflow.enter_costs(inputs)?;
        Ok(vec!["Costs recorded. Run analyze.".to_string()])
    }

    async fn chat(&mut self, message: &str) -> Result<Vec<String>, AppError> {
        if message.is_empty() {
            let transcript = self.chat.load().await?;
            if transcript.is_empty() {
                return Ok(vec!["No messages yet.".to_string()]);
            }
            return Ok(transcript.iter().flat_map(render_entry).collect());
        }

        let sent = self.chat.send(message).await?;
        let mut out = wrap_text(&format!("Assistant: {}", sent.reply), WIDTH);
        if let Some(e) = sent.persist_error {
            out.push(format!("(not saved: {})", e));
        }
        Ok(out)
    }

    async fn reports(&mut self) -> Result<Vec<String>, AppError> {
        self.listed = self.history.list().await?;
        let total = self.history.count().await?;

        let mut out = vec![format!("{} saved predictions", total)];
        for (i, p) in self.listed.iter().enumerate() {
            out.push(format!(
                "  {:>3}. {:<12} yield {:>8} margin {:>8}  {}",
                i + 1,
                p.crop,
                fmt_opt(p.predicted_yield),
                fmt_opt(p.profit_margin),
                p.date_generated.as_deref().unwrap_or("-")
            ));
        }
        Ok(out)
    }

    async fn open(&mut self, args: &str) -> Result<Vec<String>, AppError> {
        let index: usize = args
            .parse()
            .map_err(|_| AppError::Validation("usage: open <n>".into()))?;
        let prediction = index
            .checked_sub(1)
            .and_then(|i| self.listed.get(i))
            .ok_or_else(|| AppError::NotFound(format!("no listed prediction {}; run reports", index)))?;

        let report = self.history.open(prediction).await?;
        Ok(render_report(&report))
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".into())
}

fn render_entry(entry: &TranscriptEntry) -> Vec<String> {
    let who = match entry.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    wrap_text(&format!("{}: {}", who, entry.content), WIDTH)
}

fn render_analysis(analysis: &AnalysisResult) -> Vec<String> {
    let pa = &analysis.profit_analysis;
    vec![
        format!("Profit analysis for {}", pa.crop),
        format!("  Predicted yield   {}", fmt_opt(pa.predicted_yield)),
        format!("  Market price      {}", fmt_opt(pa.market_price)),
        format!("  Total revenue     {:.2}", pa.profit.total_revenue),
        format!("  Total cost        {:.2}", pa.profit.total_cost),
        format!("  Total profit      {:.2}", pa.profit.total_profit),
        format!("  Profit margin     {}", fmt_opt(pa.profit_margin)),
    ]
}

fn render_outcome(outcome: ReportOutcome) -> Vec<String> {
    let mut out = render_report(&outcome.report);
    for warning in &outcome.warnings {
        out.push(format!("(not saved: {})", warning));
    }
    out
}

pub fn render_report(report: &InsightReport) -> Vec<String> {
    let sections = report.sections();
    if sections.is_empty() {
        return vec!["No insights available for this analysis.".to_string()];
    }

    let mut out = Vec::new();
    for section in sections {
        out.push(format!("== {} ==", section.title));
        match section.body {
            SectionBody::Text(text) => out.extend(wrap_text(&text, WIDTH)),
            SectionBody::List(items) => {
                for item in items {
                    let mut lines = wrap_text(&item, WIDTH - 4).into_iter();
                    if let Some(first) = lines.next() {
                        out.push(format!("  - {}", first));
                    }
                    out.extend(lines.map(|l| format!("    {}", l)));
                }
            }
        }
        out.push(String::new());
    }
    out
}
