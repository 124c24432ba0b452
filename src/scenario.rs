use std::collections::BTreeMap;
use std::fs;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use vote_engine::*;

#[derive(Debug, Snafu)]
pub enum ScenarioError {
    #[snafu(display("Error opening scenario file {path}"))]
    OpeningScenario {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing scenario JSON"))]
    ParsingScenario { source: serde_json::Error },
    #[snafu(display("Error rendering the summary"))]
    RenderingSummary { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening reference summary {path}"))]
    OpeningReference {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Scenario setup rejected: {source}"))]
    Setup { source: EngineError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCandidate {
    pub id: String,
    pub name: String,
    pub party: Option<String>,
    #[serde(rename = "partyColor")]
    pub party_color: Option<String>,
    pub slogan: Option<String>,
    pub biography: Option<String>,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
    #[serde(rename = "bannerImage")]
    pub banner_image: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioElection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end_date: DateTime<Utc>,
    #[serde(rename = "votesPerVoter")]
    pub votes_per_voter: u64,
    pub candidates: Vec<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSubmission {
    #[serde(rename = "voterId")]
    pub voter_id: String,
    #[serde(rename = "electionId")]
    pub election_id: String,
    pub allocations: BTreeMap<String, i64>,
}

/// A full scenario document: the catalog to build and the ballots to
/// replay against it, all at one injected instant.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub now: Option<DateTime<Utc>>,
    #[serde(rename = "eligibleVoters")]
    pub eligible_voters: Option<u64>,
    #[serde(default)]
    pub candidates: Vec<ScenarioCandidate>,
    pub elections: Vec<ScenarioElection>,
    #[serde(default)]
    pub submissions: Vec<ScenarioSubmission>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn candidate_result_js(r: &CandidateResult) -> JSValue {
    json!({
        "candidateId": r.candidate.id.as_str(),
        "name": r.candidate.name,
        "votes": r.votes,
        "percentage": round1(r.percentage),
    })
}

/// Replays the scenario at `now` and returns the summary as JSON.
///
/// Rejected submissions do not abort the replay; their typed error is
/// recorded in the summary so scenarios can cover failure paths.
pub fn replay(scenario: &Scenario, now: DateTime<Utc>) -> ScenarioResult<JSValue> {
    let engine = VotingEngine::new();

    for c in &scenario.candidates {
        engine
            .add_candidate(Candidate {
                id: c.id.clone().into(),
                name: c.name.clone(),
                party: c.party.clone().unwrap_or_default(),
                party_color: c.party_color.clone().unwrap_or_default(),
                slogan: c.slogan.clone().unwrap_or_default(),
                biography: c.biography.clone().unwrap_or_default(),
                profile_image: c.profile_image.clone().unwrap_or_default(),
                banner_image: c.banner_image.clone().unwrap_or_default(),
                followers: 0,
                total_votes: 0,
            })
            .context(SetupSnafu)?;
    }
    for e in &scenario.elections {
        engine
            .create_election(ElectionSpec {
                id: e.id.clone().into(),
                name: e.name.clone(),
                description: e.description.clone().unwrap_or_default(),
                start_date: e.start_date,
                end_date: e.end_date,
                votes_per_voter: e.votes_per_voter,
                candidates: e.candidates.iter().map(|s| s.clone().into()).collect(),
                is_active: e.is_active.unwrap_or(true),
            })
            .context(SetupSnafu)?;
    }

    let mut submissions_js: Vec<JSValue> = Vec::new();
    for s in &scenario.submissions {
        let voter: VoterId = s.voter_id.clone().into();
        let election: ElectionId = s.election_id.clone().into();
        let request: AllocationRequest = s
            .allocations
            .iter()
            .map(|(cid, count)| (cid.clone().into(), *count))
            .collect();
        match engine.submit_allocation(&voter, &election, &request, now) {
            Ok(entry) => {
                submissions_js.push(json!({
                    "voterId": s.voter_id,
                    "electionId": s.election_id,
                    "accepted": true,
                    "usedVotes": entry.used_votes(),
                }));
            }
            Err(err) => {
                warn!("replay: submission by {} rejected: {}", s.voter_id, err);
                submissions_js.push(json!({
                    "voterId": s.voter_id,
                    "electionId": s.election_id,
                    "accepted": false,
                    "error": err.to_string(),
                }));
            }
        }
    }

    let mut elections_js: Vec<JSValue> = Vec::new();
    for e in &scenario.elections {
        let id: ElectionId = e.id.clone().into();
        let election = engine.catalog().get_election(&id).context(SetupSnafu)?;
        let results = engine.compute_results(&id).context(SetupSnafu)?;
        let winner = engine.winner(&id).context(SetupSnafu)?;
        let margin = engine.lead_margin(&id).context(SetupSnafu)?;
        let turnout = engine
            .compute_turnout(&id, scenario.eligible_voters.unwrap_or(0))
            .context(SetupSnafu)?;
        elections_js.push(json!({
            "electionId": e.id,
            "status": derive_status(&election, now).to_string(),
            "totalVotesCast": election.total_votes_cast,
            "turnout": round1(turnout),
            "leadMargin": margin.map(round1),
            "winner": winner.map(|w| candidate_result_js(&w)),
            "results": results.iter().map(candidate_result_js).collect::<Vec<JSValue>>(),
        }));
    }

    Ok(json!({
        "now": now.to_rfc3339(),
        "elections": elections_js,
        "submissions": submissions_js,
    }))
}

fn read_summary(path: String) -> ScenarioResult<JSValue> {
    let contents = fs::read_to_string(&path).context(OpeningReferenceSnafu { path: path.clone() })?;
    debug!("read reference content: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingScenarioSnafu {})
}

pub fn run_scenario(
    scenario_path: String,
    out_path: Option<String>,
    check_summary_path: Option<String>,
    now_override: Option<DateTime<Utc>>,
) -> ScenarioResult<()> {
    let contents = fs::read_to_string(&scenario_path).context(OpeningScenarioSnafu {
        path: scenario_path.clone(),
    })?;
    let scenario: Scenario =
        serde_json::from_str(contents.as_str()).context(ParsingScenarioSnafu {})?;
    info!(
        "scenario {}: {} candidates, {} elections, {} submissions",
        scenario_path,
        scenario.candidates.len(),
        scenario.elections.len(),
        scenario.submissions.len()
    );

    let now = now_override.or(scenario.now).unwrap_or_else(Utc::now);
    let summary = replay(&scenario, now)?;
    let pretty_summary =
        serde_json::to_string_pretty(&summary).context(RenderingSummarySnafu {})?;
    match out_path {
        Some(path) if path != "stdout" => {
            fs::write(&path, &pretty_summary)
                .context(WritingSummarySnafu { path: path.clone() })?;
            info!("summary written to {}", path);
        }
        _ => println!("{}", pretty_summary),
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_ref =
            serde_json::to_string_pretty(&summary_ref).context(RenderingSummarySnafu {})?;
        if pretty_ref != pretty_summary {
            warn!("Found differences with the reference summary");
            print_diff(pretty_ref.as_str(), pretty_summary.as_str(), "\n");
            whatever!("Difference detected between computed summary and reference summary");
        }
    }

    Ok(())
}
