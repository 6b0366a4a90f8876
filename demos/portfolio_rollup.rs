use chrono::NaiveDate;
use facility_rollup::*;

fn main() -> anyhow::Result<()> {
    let source = match std::env::args().nth(1) {
        Some(path) => InMemoryDataSource::from_json_str(&std::fs::read_to_string(path)?)?,
        None => sample_portfolio(),
    };
    let period_arg = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "2024-01:2024-03".to_string());
    let period = DateRange::parse(&period_arg)?;
    let engine = RollupEngine::new(&source, RollupConfig::default());

    let portfolio = engine.portfolio_metrics(&period)?;
    println!("Portfolio {} to {}", period.start, period.end);
    println!(
        "  revenue {:.2}  expenses {:.2}  NOI {:.2}  margin {:.1}%",
        portfolio.summary.total_revenue,
        portfolio.summary.total_expenses,
        portfolio.summary.net_operating_income,
        portfolio.summary.profit_margin
    );
    println!(
        "  occupancy {:.1}%  collection {:.1}%  budget used {:.1}%",
        portfolio.occupancy_rate, portfolio.rent_collection_rate, portfolio.budget_utilization
    );

    for b in &portfolio.buildings {
        println!(
            "  - {:<20} NOI {:>10.2}  occupancy {:>5.1}%",
            b.building_name, b.summary.net_operating_income, b.occupancy.occupancy_rate
        );
    }

    for project in source.projects(engine.access())? {
        let m = engine.project_metrics(&project.id, &period)?;
        println!(
            "Project {}: cost {:.2} / budget {:.2}, profit variance {:.1}%, health {:.0} ({:?})",
            m.project_name,
            m.costs.total,
            m.costs.estimated_budget,
            m.profit.variance_percentage,
            m.health.score,
            m.health.status
        );
    }

    let store = InMemorySnapshotStore::new();
    let snapshot = SnapshotCapture::new(&engine, &store).capture(MetricType::Monthly, period.end)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn sample_portfolio() -> InMemoryDataSource {
    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap_or_default();
    InMemoryDataSource {
        buildings: vec![
            Building {
                id: "harbour".to_string(),
                name: "Harbour View".to_string(),
                total_units: 24,
                occupied_units: 21,
            },
            Building {
                id: "mill".to_string(),
                name: "Old Mill Lofts".to_string(),
                total_units: 10,
                occupied_units: 7,
            },
        ],
        projects: vec![Project {
            id: "roof".to_string(),
            name: "Roof replacement".to_string(),
            building_id: Some("mill".to_string()),
            estimated_budget: 40_000.0,
            actual_cost: 0.0,
            status: ProjectStatus::InProgress,
            start_date: Some(d(2024, 1, 8)),
            end_date: Some(d(2024, 4, 30)),
        }],
        milestones: vec![Milestone {
            id: "strip".to_string(),
            project_id: "roof".to_string(),
            name: "Strip old roof".to_string(),
            budget_allocated: 15_000.0,
            actual_cost: 17_250.0,
            expected_profit: 0.0,
            status: MilestoneStatus::Completed,
            start_date: Some(d(2024, 1, 8)),
            due_date: Some(d(2024, 2, 15)),
        }],
        rent_payments: vec![
            RentPayment {
                id: "h-jan".to_string(),
                building_id: "harbour".to_string(),
                unit_id: None,
                amount: 31_500.0,
                amount_paid: 30_000.0,
                status: RentPaymentStatus::PartiallyPaid,
                due_date: d(2024, 1, 1),
                paid_date: Some(d(2024, 1, 5)),
            },
            RentPayment {
                id: "m-jan".to_string(),
                building_id: "mill".to_string(),
                unit_id: None,
                amount: 9_800.0,
                amount_paid: 9_800.0,
                status: RentPaymentStatus::Paid,
                due_date: d(2024, 1, 1),
                paid_date: Some(d(2024, 1, 3)),
            },
        ],
        operational_expenses: vec![OperationalExpense {
            id: "h-power".to_string(),
            building_id: Some("harbour".to_string()),
            amount: 4_200.0,
            category: "utilities".to_string(),
            date: d(2024, 2, 1),
            is_approved: true,
        }],
        ..Default::default()
    }
}
