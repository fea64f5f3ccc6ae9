use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::models::{CategoryCount, CategoryShare};
use crate::reports::advisory::AdvisoryImpact;
use crate::reports::assessments::TestPerformance;
use crate::reports::channels::ChannelsOverview;
use crate::reports::conversions::ConversionsOverview;
use crate::reports::executive::ExecutiveSummary;
use crate::reports::geographic::GeographicOverview;
use crate::reports::history::ProspectHistory;
use crate::reports::interactions::InteractionsOverview;
use crate::reports::prospects::ProspectsOverview;
use crate::reports::realtime::KpiSnapshot;
use crate::reports::trends::TrendsOverview;
use crate::reports::Overview;
use crate::source::ReportFilters;

fn title(overview: &Overview) -> &'static str {
    match overview {
        Overview::Prospects(_) => "Prospects Overview",
        Overview::Conversions(_) => "Conversion Funnel",
        Overview::Channels(_) => "Channel Effectiveness",
        Overview::Geographic(_) => "Geographic Distribution",
        Overview::Interactions(_) => "Interaction Patterns",
        Overview::Executive(_) => "Executive Summary",
        Overview::Tests(_) => "Test Performance",
        Overview::Advisory(_) => "Advisory Impact",
        Overview::Trends(_) => "Registration Trends",
        Overview::Kpis(_) => "Real-Time KPIs",
    }
}

fn describe_filters(filters: &ReportFilters) -> String {
    let mut parts = Vec::new();
    if let Some(start) = filters.start_date {
        parts.push(format!("from {start}"));
    }
    if let Some(end) = filters.end_date {
        parts.push(format!("until {end}"));
    }
    if let Some(city) = &filters.city {
        parts.push(format!("city {city}"));
    }
    if let Some(channel) = &filters.channel {
        parts.push(format!("channel {channel}"));
    }
    if let Some(status) = &filters.status {
        parts.push(format!("status {status}"));
    }
    if parts.is_empty() {
        "all prospects".to_string()
    } else {
        parts.join(", ")
    }
}

fn counts(output: &mut String, heading: &str, entries: &[CategoryCount]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");
    if entries.is_empty() {
        let _ = writeln!(output, "No records.");
    }
    for entry in entries {
        let _ = writeln!(output, "- {}: {}", entry.key, entry.count);
    }
}

fn shares(output: &mut String, heading: &str, entries: &[CategoryShare]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");
    if entries.is_empty() {
        let _ = writeln!(output, "No records.");
    }
    for entry in entries {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            entry.key, entry.count, entry.percentage
        );
    }
}

pub fn render(overview: &Overview, filters: &ReportFilters, generated_at: NaiveDateTime) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", title(overview));
    let _ = writeln!(
        output,
        "Generated {} for {}",
        generated_at.format("%Y-%m-%d %H:%M"),
        describe_filters(filters)
    );

    match overview {
        Overview::Prospects(view) => prospects(&mut output, view),
        Overview::Conversions(view) => conversions(&mut output, view),
        Overview::Channels(view) => channels(&mut output, view),
        Overview::Geographic(view) => geographic(&mut output, view),
        Overview::Interactions(view) => interactions(&mut output, view),
        Overview::Executive(view) => executive(&mut output, view),
        Overview::Tests(view) => test_performance(&mut output, view),
        Overview::Advisory(view) => advisory(&mut output, view),
        Overview::Trends(view) => trends(&mut output, view),
        Overview::Kpis(view) => kpis(&mut output, view),
    }

    output
}

fn prospects(output: &mut String, view: &ProspectsOverview) {
    let totals = &view.totals;
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} prospects, {} enrolled, {} in contact, across {} cities.",
        totals.total, totals.enrolled, totals.in_contact, totals.cities
    );
    counts(output, "Top Cities", &view.top_cities);
    shares(output, "Status Mix", &view.statuses);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Channels");
    for channel in &view.channels {
        let _ = writeln!(
            output,
            "- {}: {} leads, contact {:.1}%, conversion {:.1}%",
            channel.channel, channel.count, channel.contact_rate, channel.conversion_rate
        );
    }
}

fn conversions(output: &mut String, view: &ConversionsOverview) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} prospects in the funnel, overall conversion {:.1}%.",
        view.total_prospects, view.overall_conversion
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stages");
    let _ = writeln!(output, "| Stage | Count | Share | Conversion |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for stage in &view.stages {
        let _ = writeln!(
            output,
            "| {} | {} | {:.1}% | {:.1}% |",
            stage.stage, stage.count, stage.percentage, stage.conversion_rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Transitions");
    for transition in &view.transitions {
        let _ = writeln!(
            output,
            "- {} → {}: {:.1}%",
            transition.from, transition.to, transition.rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Conversion");
    if view.timeline.is_empty() {
        let _ = writeln!(output, "No dated registrations.");
    }
    for period in &view.timeline {
        let _ = writeln!(
            output,
            "- {}: {} of {} enrolled ({:.1}%)",
            period.period, period.enrolled, period.total, period.conversion_rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Best Channels");
    for channel in &view.best_channels {
        let _ = writeln!(output, "- {}: {:.1}%", channel.channel, channel.conversion_rate);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weakest Channels");
    for channel in &view.worst_channels {
        let _ = writeln!(output, "- {}: {:.1}%", channel.channel, channel.conversion_rate);
    }
}

fn channels(output: &mut String, view: &ChannelsOverview) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} leads, {} enrolled, average conversion {:.1}%.",
        view.total_leads, view.total_enrolled, view.average_conversion
    );
    if let Some(best) = &view.best_performing {
        let _ = writeln!(
            output,
            "Best performer: {} at {:.1}%.",
            best.channel, best.conversion_rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Quality");
    let _ = writeln!(output, "| Channel | Leads | Contact | Conversion | Quality | Rating |");
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---|");
    for ranked in &view.by_quality {
        let channel = &ranked.aggregate;
        let _ = writeln!(
            output,
            "| {} | {} | {:.1}% | {:.1}% | {:.1} | {} |",
            channel.channel,
            channel.total_leads,
            channel.contact_rate,
            channel.conversion_rate,
            channel.quality_score,
            ranked.performance
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    for channel in &view.needs_attention {
        let _ = writeln!(output, "- {}: {:.1}%", channel.channel, channel.conversion_rate);
    }
}

fn geographic(output: &mut String, view: &GeographicOverview) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} prospects in {} cities, {} enrolled, average conversion {:.1}%.",
        view.total_prospects, view.total_cities, view.total_enrolled, view.average_conversion
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Cities");
    for city in &view.top_cities {
        let _ = writeln!(
            output,
            "- {}: {} prospects ({:.1}% of total), conversion {:.1}%",
            city.aggregate.city, city.aggregate.total, city.share, city.aggregate.conversion_rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Best Converting");
    for city in &view.best_converting {
        let _ = writeln!(
            output,
            "- {}: {:.1}%",
            city.aggregate.city, city.aggregate.conversion_rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Opportunities");
    if view.opportunities.is_empty() {
        let _ = writeln!(output, "No cities below the conversion threshold.");
    }
    for city in &view.opportunities {
        let _ = writeln!(
            output,
            "- {}: {} prospects at {:.1}%",
            city.aggregate.city, city.aggregate.total, city.aggregate.conversion_rate
        );
    }
}

fn interactions(output: &mut String, view: &InteractionsOverview) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} interactions from {} prospects ({:.1} each), {} in the last week.",
        view.total, view.unique_prospects, view.average_per_prospect, view.recent_total
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Modules");
    for module in &view.modules {
        let _ = writeln!(
            output,
            "- {}: {} interactions ({:.1}%), {} prospects",
            module.module, module.interactions, module.share, module.unique_prospects
        );
    }
    shares(output, "Actions", &view.actions);
    counts(output, "Devices", &view.devices);
    counts(output, "Statuses", &view.statuses);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Activity");
    for bucket in &view.timeline {
        let _ = writeln!(output, "- {}: {}", bucket.period, bucket.count);
    }
}

fn executive(output: &mut String, view: &ExecutiveSummary) {
    let kpis = &view.kpis;
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} prospects, {} enrolled, conversion {:.1}% against a {:.0}% goal ({}).",
        kpis.total_prospects,
        kpis.total_enrolled,
        kpis.conversion_rate,
        kpis.conversion_goal,
        if kpis.goal_met { "met" } else { "not met" }
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Channels");
    let _ = writeln!(output, "| Channel | Leads | Enrolled | Conversion | ROI | Status |");
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---|");
    for channel in &view.top_channels {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1}% | {:.1}x | {} |",
            channel.channel,
            channel.total,
            channel.enrolled,
            channel.conversion_rate,
            channel.estimated_roi,
            channel.status
        );
    }
    counts(output, "Top Cities", &view.top_cities);
}

fn test_performance(output: &mut String, view: &TestPerformance) {
    let overall = &view.overall;
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} tests, average {:.1} (min {:.1}, max {:.1}); enrolled prospects average {:.1}.",
        overall.total_tests, overall.average, overall.min, overall.max, view.enrolled_average
    );
    shares(output, "Classifications", &view.classifications);
    counts(output, "Score Bands", &view.bands);
}

fn advisory(output: &mut String, view: &AdvisoryImpact) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} prospects advised ({:.1}% coverage), {} without advisory.",
        view.prospects_with_advisory, view.advisory_coverage, view.prospects_without_advisory
    );
    let _ = writeln!(
        output,
        "{} advised prospects enrolled ({:.1}%).",
        view.enrolled_with_advisory, view.advisory_conversion_rate
    );
    counts(output, "Preferred Modalities", &view.preferred_modalities);
}

fn trends(output: &mut String, view: &TrendsOverview) {
    let _ = writeln!(output);
    let _ = writeln!(output, "{} periods.", view.total_periods);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Period | Registrations | Enrollments | Conversion |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for point in &view.trends {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1}% |",
            point.period, point.registrations, point.enrollments, point.conversion_rate
        );
    }
}

fn signed(value: f64) -> String {
    format!("{value:+.1}")
}

fn kpis(output: &mut String, view: &KpiSnapshot) {
    let real_time = &view.real_time;
    let operational = &view.operational;
    let _ = writeln!(output);
    let _ = writeln!(output, "As of {}.", view.reference_date);

    let _ = writeln!(output);
    let _ = writeln!(output, "## This Month");
    let _ = writeln!(
        output,
        "- Leads: {} ({}% vs {} last month)",
        real_time.leads_this_month,
        signed(real_time.leads_trend),
        real_time.leads_previous_month
    );
    let _ = writeln!(
        output,
        "- Enrolled: {} ({}% vs {} last month)",
        real_time.enrolled_this_month,
        signed(real_time.enrolled_trend),
        real_time.enrolled_previous_month
    );
    let _ = writeln!(
        output,
        "- Conversion trend: {} pts",
        signed(real_time.conversion_trend)
    );
    let _ = writeln!(
        output,
        "- All time: {} leads, {} enrolled ({:.1}%)",
        real_time.total_leads, real_time.total_enrolled, real_time.conversion_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Operations");
    let _ = writeln!(output, "- New prospects (7 days): {}", operational.new_prospects_week);
    let _ = writeln!(output, "- Enrollments (30 days): {}", operational.enrollments_month);
    let _ = writeln!(output, "- In process: {}", operational.prospects_in_process);
    let _ = writeln!(
        output,
        "- Recent interactions / tests / advisories: {} / {} / {}",
        operational.recent_interactions, operational.recent_tests, operational.recent_advisories
    );
    let _ = writeln!(output, "- Weekly conversion: {:.1}%", operational.weekly_conversion);
}

pub fn render_history(history: &ProspectHistory) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Prospect {}", history.prospect_id);

    match &history.prospect {
        Some(prospect) => {
            let _ = writeln!(
                output,
                "{} ({}), {} via {}, status {}",
                prospect.name.as_deref().unwrap_or("Unnamed"),
                prospect.email.as_deref().unwrap_or("no email"),
                prospect.city,
                prospect.channel,
                prospect.status_label
            );
        }
        None => {
            let _ = writeln!(output, "No prospect record found.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Interactions");
    if history.interactions.is_empty() {
        let _ = writeln!(output, "No interactions recorded.");
    }
    for interaction in &history.interactions {
        let at = interaction
            .occurred_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let _ = writeln!(
            output,
            "- {} step {}: {} / {} ({})",
            at, interaction.flow_step, interaction.module, interaction.action, interaction.status
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tests");
    if history.tests.is_empty() {
        let _ = writeln!(output, "No tests taken.");
    }
    for test in &history.tests {
        let _ = writeln!(
            output,
            "- {}: {:.1} {} [{}]",
            test.result
                .taken_at
                .map(|at| at.date().to_string())
                .unwrap_or_else(|| "undated".to_string()),
            test.result.score,
            test.result.classification,
            test.band.label()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Advisories");
    if history.advisories.is_empty() {
        let _ = writeln!(output, "No advisories held.");
    }
    for advisory in &history.advisories {
        let _ = writeln!(
            output,
            "- {}: {} modality, barriers: {}",
            advisory
                .held_at
                .map(|at| at.date().to_string())
                .unwrap_or_else(|| "undated".to_string()),
            advisory.modality,
            advisory.barriers.as_deref().unwrap_or("none noted")
        );
    }

    output
}
