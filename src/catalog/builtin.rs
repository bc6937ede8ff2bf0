//! Built-in wealth-management workflows

use crate::models::{
    ComplexityTier::{Complex, Moderate, Simple},
    ExecutionPattern::{EventDriven, Loop, MasterOrchestration, Parallel, Scheduled, Sequential},
    WorkflowCategory::{Advisor, Client, Operations},
    WorkflowDefinition,
};

/// Definitions registered by [`super::Catalog::with_builtin_workflows`], in catalog order.
pub fn builtin_workflows() -> Vec<WorkflowDefinition> {
    let mut workflows = advisor_workflows();
    workflows.extend(client_workflows());
    workflows.extend(operations_workflows());
    workflows
}

fn advisor_workflows() -> Vec<WorkflowDefinition> {
    vec![
        WorkflowDefinition::new(
            "ADV001",
            "Client Meeting Preparation and Follow-up",
            Advisor,
            Sequential,
            Moderate,
            &[
                "Gather client portfolio summary",
                "Review recent market performance",
                "Prepare meeting agenda",
                "Collect relevant documents",
                "Conduct meeting",
                "Document discussion points",
                "Create action items",
                "Schedule follow-up tasks",
            ],
        )
        .with_description(
            "Systematic preparation for client meetings including agenda creation, document gathering, and post-meeting action items",
        )
        .with_personas(&["Financial Advisor", "Relationship Manager"])
        .with_triggers(&["Meeting scheduled", "Follow-up required"])
        .with_tools(&[
            "get_portfolio_summary",
            "generate_market_commentary",
            "create_meeting_agenda",
            "document_meeting_notes",
            "track_action_items",
            "schedule_follow_up",
        ]),
        WorkflowDefinition::new(
            "ADV002",
            "Portfolio Performance Review and Reporting",
            Advisor,
            Sequential,
            Complex,
            &[
                "Calculate performance metrics",
                "Compare against benchmarks",
                "Analyze attribution factors",
                "Identify outperforming/underperforming positions",
                "Generate performance charts",
                "Prepare executive summary",
                "Create detailed report",
                "Schedule client presentation",
            ],
        )
        .with_description(
            "Comprehensive analysis of portfolio performance against benchmarks with detailed reporting",
        )
        .with_personas(&["Portfolio Manager", "Investment Analyst"])
        .with_triggers(&["Quarterly review", "Performance concern", "Client request"])
        .with_tools(&[
            "calculate_performance_metrics",
            "generate_allocation_charts",
            "analyze_attribution",
            "create_performance_report",
            "benchmark_comparison",
            "schedule_client_meeting",
        ]),
        WorkflowDefinition::new(
            "ADV003",
            "Risk Assessment and Management",
            Advisor,
            Loop,
            Complex,
            &[
                "Assess portfolio risk metrics",
                "Identify concentration risks",
                "Analyze market correlations",
                "Stress test scenarios",
                "Evaluate liquidity risks",
                "Recommend risk mitigation",
                "Implement hedging strategies",
                "Monitor ongoing exposure",
            ],
        )
        .with_description(
            "Comprehensive risk analysis across client portfolios with mitigation strategies",
        )
        .with_personas(&["Risk Manager", "Portfolio Manager"])
        .with_triggers(&["Risk threshold breach", "Market volatility", "Periodic review"])
        .with_tools(&[
            "assess_portfolio_risk",
            "analyze_concentration",
            "stress_test_portfolio",
            "calculate_var",
            "liquidity_analysis",
            "hedging_recommendations",
        ]),
        WorkflowDefinition::new(
            "ADV004",
            "Investment Research and Recommendation",
            Advisor,
            Sequential,
            Complex,
            &[
                "Conduct fundamental analysis",
                "Evaluate technical indicators",
                "Assess market conditions",
                "Analyze competitive landscape",
                "Review ESG factors",
                "Determine client suitability",
                "Create investment thesis",
                "Generate recommendation report",
            ],
        )
        .with_description("In-depth research on investment opportunities with suitability analysis")
        .with_personas(&["Research Analyst", "Portfolio Manager"])
        .with_triggers(&["New investment opportunity", "Sector analysis request"])
        .with_tools(&[
            "generate_investment_research",
            "analyze_fundamentals",
            "technical_analysis",
            "esg_analysis",
            "suitability_assessment",
            "create_investment_report",
        ]),
        WorkflowDefinition::new(
            "ADV005",
            "Client Acquisition and Onboarding",
            Advisor,
            Parallel,
            Moderate,
            &[
                "Initial prospect qualification",
                "Needs assessment interview",
                "Service proposal creation",
                "Client agreement execution",
                "KYC documentation collection",
                "Risk tolerance assessment",
                "Investment goal setting",
                "Account setup and funding",
            ],
        )
        .with_description("Complete process for acquiring new clients and systematic onboarding")
        .with_personas(&["Business Development", "Client Services"])
        .with_triggers(&["New prospect", "Referral received"])
        .with_tools(&[
            "collect_kyc_information",
            "assess_risk_tolerance",
            "set_investment_goals",
            "create_client_profile",
            "initialize_user_session",
            "account_setup",
        ]),
        WorkflowDefinition::new(
            "ADV006",
            "Wealth Planning and Goal Tracking",
            Advisor,
            Sequential,
            Complex,
            &[
                "Assess current financial position",
                "Define specific goals and timelines",
                "Project cash flow requirements",
                "Develop investment strategy",
                "Create implementation plan",
                "Monitor goal progress",
                "Adjust strategies as needed",
                "Report on goal achievement",
            ],
        )
        .with_description("Comprehensive financial planning with goal-based investment strategies")
        .with_personas(&["Financial Planner", "Wealth Advisor"])
        .with_triggers(&["Life event", "Goal review", "Annual planning"])
        .with_tools(&[
            "track_goal_progress",
            "project_goal_timeline",
            "suggest_goal_adjustments",
            "calculate_required_savings",
            "cash_flow_projection",
            "strategy_optimization",
        ]),
        WorkflowDefinition::new(
            "ADV007",
            "Market Volatility Response",
            Advisor,
            EventDriven,
            Moderate,
            &[
                "Analyze market volatility levels",
                "Assess client portfolio impacts",
                "Generate market commentary",
                "Create client communications",
                "Trigger proactive outreach",
                "Provide reassurance and guidance",
                "Document client interactions",
                "Monitor ongoing conditions",
            ],
        )
        .with_description("Systematic response to market volatility events with client communication")
        .with_personas(&["Market Strategist", "Client Advisor"])
        .with_triggers(&["VIX spike", "Market decline", "Volatility alert"])
        .with_tools(&[
            "analyze_market_volatility",
            "assess_portfolio_impact",
            "generate_market_commentary",
            "create_comfort_call_scripts",
            "trigger_proactive_outreach",
            "document_interactions",
        ]),
        WorkflowDefinition::new(
            "ADV008",
            "Regulatory Compliance Management",
            Advisor,
            Scheduled,
            Complex,
            &[
                "Monitor regulatory changes",
                "Assess compliance requirements",
                "Update policies and procedures",
                "Conduct staff training",
                "Perform compliance testing",
                "Generate regulatory reports",
                "File required submissions",
                "Document compliance activities",
            ],
        )
        .with_description("Ongoing compliance monitoring and regulatory requirement fulfillment")
        .with_personas(&["Compliance Officer", "Operations Manager"])
        .with_triggers(&["Regulatory deadline", "Compliance review", "Audit requirement"])
        .with_tools(&[
            "monitor_regulatory_changes",
            "assess_fiduciary_compliance",
            "generate_regulatory_report",
            "conduct_aml_screening",
            "generate_compliance_training",
            "audit_compliance",
        ]),
        WorkflowDefinition::new(
            "ADV009",
            "Crisis Management and Communication",
            Advisor,
            EventDriven,
            Complex,
            &[
                "Initiate emergency protocols",
                "Assess crisis severity and impact",
                "Coordinate team response",
                "Prepare crisis communications",
                "Execute client outreach plan",
                "Provide behavioral coaching",
                "Monitor client sentiment",
                "Document crisis response",
            ],
        )
        .with_description("Emergency response protocols for market crises and client support")
        .with_personas(&["Crisis Manager", "Senior Advisor"])
        .with_triggers(&["Market crash", "Economic crisis", "Firm emergency"])
        .with_tools(&[
            "initiate_emergency_protocol",
            "provide_behavioral_coaching",
            "prepare_scenario_analysis",
            "coordinate_emergency_meeting",
            "document_crisis_interaction",
            "crisis_communication",
        ]),
        WorkflowDefinition::new(
            "ADV010",
            "Tax Optimization and Planning",
            Advisor,
            Scheduled,
            Complex,
            &[
                "Analyze tax situation",
                "Identify optimization opportunities",
                "Calculate potential tax savings",
                "Implement tax-loss harvesting",
                "Optimize asset location",
                "Plan charitable giving strategies",
                "Coordinate with tax professionals",
                "Monitor tax implications",
            ],
        )
        .with_description("Year-round tax planning with optimization strategies and loss harvesting")
        .with_personas(&["Tax Planner", "Wealth Advisor"])
        .with_triggers(&["Year-end planning", "Tax deadline", "Harvest opportunity"])
        .with_tools(&[
            "calculate_tax_optimization",
            "tax_loss_harvesting",
            "asset_location_analysis",
            "charitable_giving_planning",
            "tax_impact_analysis",
            "professional_coordination",
        ]),
        WorkflowDefinition::new(
            "ADV011",
            "Alternative Investment Analysis",
            Advisor,
            Sequential,
            Complex,
            &[
                "Assess client suitability",
                "Conduct due diligence review",
                "Analyze risk-return profile",
                "Evaluate liquidity constraints",
                "Review manager track record",
                "Assess portfolio fit",
                "Prepare investment committee presentation",
                "Execute investment if approved",
            ],
        )
        .with_description("Due diligence and suitability analysis for alternative investments")
        .with_personas(&["Alternative Investment Specialist", "Due Diligence Analyst"])
        .with_triggers(&["Alternative investment opportunity", "Diversification need"])
        .with_tools(&[
            "assess_alternative_investments",
            "due_diligence_analysis",
            "liquidity_assessment",
            "manager_evaluation",
            "suitability_scoring",
            "committee_presentation",
        ]),
        WorkflowDefinition::new(
            "ADV012",
            "ESG Integration and Reporting",
            Advisor,
            Loop,
            Moderate,
            &[
                "Conduct ESG portfolio analysis",
                "Assess sustainability metrics",
                "Identify ESG improvement opportunities",
                "Implement ESG-focused investments",
                "Monitor impact metrics",
                "Generate sustainability reports",
                "Communicate ESG outcomes",
                "Continuous ESG monitoring",
            ],
        )
        .with_description(
            "Environmental, Social, and Governance factor integration into investment process",
        )
        .with_personas(&["ESG Analyst", "Sustainable Investing Specialist"])
        .with_triggers(&["ESG review", "Impact reporting", "Sustainable investing request"])
        .with_tools(&[
            "generate_esg_analysis",
            "sustainability_scoring",
            "impact_measurement",
            "esg_reporting",
            "sustainable_product_screening",
            "impact_tracking",
        ]),
        WorkflowDefinition::new(
            "ADV013",
            "Portfolio Rebalancing Workflows",
            Advisor,
            EventDriven,
            Moderate,
            &[
                "Monitor allocation drift",
                "Assess rebalancing triggers",
                "Calculate optimal trades",
                "Consider tax implications",
                "Execute rebalancing trades",
                "Minimize transaction costs",
                "Update allocation targets",
                "Document rebalancing rationale",
            ],
        )
        .with_description(
            "Systematic portfolio rebalancing based on drift thresholds and market conditions",
        )
        .with_personas(&["Portfolio Manager", "Trading Specialist"])
        .with_triggers(&["Allocation drift", "Rebalancing threshold", "Market opportunity"])
        .with_tools(&[
            "monitor_allocation_drift",
            "calculate_rebalancing_trades",
            "tax_aware_rebalancing",
            "cost_optimization",
            "trade_execution",
            "allocation_tracking",
        ]),
        WorkflowDefinition::new(
            "ADV014",
            "Client Education and Communication",
            Advisor,
            Scheduled,
            Simple,
            &[
                "Assess client education needs",
                "Create educational content",
                "Personalize communication approach",
                "Deliver educational sessions",
                "Provide market updates",
                "Answer client questions",
                "Measure engagement effectiveness",
                "Continuously improve content",
            ],
        )
        .with_description(
            "Ongoing client education programs and personalized communication strategies",
        )
        .with_personas(&["Client Education Specialist", "Communications Manager"])
        .with_triggers(&["Education schedule", "Market event", "Client question"])
        .with_tools(&[
            "generate_personalized_communication",
            "create_educational_content",
            "measure_engagement",
            "content_personalization",
            "educational_delivery",
            "effectiveness_tracking",
        ]),
        WorkflowDefinition::new(
            "ADV015",
            "Business Development and Referrals",
            Advisor,
            Loop,
            Moderate,
            &[
                "Identify referral opportunities",
                "Cultivate referral sources",
                "Track referral pipeline",
                "Nurture prospect relationships",
                "Convert prospects to clients",
                "Recognize referral sources",
                "Measure business development ROI",
                "Continuously improve process",
            ],
        )
        .with_description("Systematic approach to business development and referral management")
        .with_personas(&["Business Development Manager", "Relationship Manager"])
        .with_triggers(&[
            "Referral opportunity",
            "Business development target",
            "Client satisfaction",
        ])
        .with_tools(&[
            "referral_tracking",
            "prospect_nurturing",
            "conversion_optimization",
            "roi_measurement",
            "relationship_management",
            "business_analytics",
        ]),
    ]
}

fn client_workflows() -> Vec<WorkflowDefinition> {
    vec![
        WorkflowDefinition::new(
            "CLI001",
            "Financial Planning Consultation",
            Client,
            Sequential,
            Complex,
            &[
                "Schedule planning consultation",
                "Complete financial questionnaire",
                "Gather financial documents",
                "Analyze current situation",
                "Define financial goals",
                "Develop planning strategies",
                "Present recommendations",
                "Implement approved strategies",
            ],
        )
        .with_description(
            "Comprehensive financial planning sessions with goal setting and strategy development",
        )
        .with_personas(&["Client", "Financial Planner"])
        .with_triggers(&["Planning request", "Life event", "Annual review"])
        .with_tools(&[
            "financial_questionnaire",
            "document_analysis",
            "goal_setting_tools",
            "strategy_development",
            "recommendation_presentation",
            "implementation_tracking",
        ]),
        WorkflowDefinition::new(
            "CLI002",
            "Investment Goal Setting and Tracking",
            Client,
            Loop,
            Moderate,
            &[
                "Define specific investment goals",
                "Set realistic timelines",
                "Determine required contributions",
                "Track goal progress regularly",
                "Assess progress vs targets",
                "Adjust strategies if needed",
                "Celebrate goal achievements",
                "Set new goals as appropriate",
            ],
        )
        .with_description(
            "Interactive goal setting with ongoing progress monitoring and adjustments",
        )
        .with_personas(&["Client", "Goal Planning Specialist"])
        .with_triggers(&["Goal setting session", "Progress review", "Goal modification"])
        .with_tools(&[
            "set_investment_goals",
            "track_goal_progress",
            "project_goal_timeline",
            "suggest_goal_adjustments",
            "calculate_required_savings",
            "progress_reporting",
        ]),
        WorkflowDefinition::new(
            "CLI003",
            "Portfolio Review and Discussion",
            Client,
            Scheduled,
            Moderate,
            &[
                "Review portfolio performance",
                "Discuss market conditions",
                "Address client questions",
                "Review goal progress",
                "Discuss strategy changes",
                "Plan next steps",
                "Schedule follow-up",
                "Document discussion",
            ],
        )
        .with_description("Regular portfolio review meetings with performance discussion")
        .with_personas(&["Client", "Portfolio Advisor"])
        .with_triggers(&["Quarterly review", "Performance concern", "Client request"])
        .with_tools(&[
            "portfolio_performance_review",
            "market_discussion",
            "goal_progress_review",
            "strategy_discussion",
            "meeting_documentation",
            "follow_up_scheduling",
        ]),
    ]
}

fn operations_workflows() -> Vec<WorkflowDefinition> {
    vec![
        WorkflowDefinition::new(
            "OPS001",
            "Account Administration and Maintenance",
            Operations,
            Loop,
            Simple,
            &[
                "Process account updates",
                "Handle transfer requests",
                "Maintain client records",
                "Update beneficiary information",
                "Process address changes",
                "Handle name changes",
                "Update contact preferences",
                "Maintain audit trail",
            ],
        )
        .with_description(
            "Ongoing account maintenance including updates, transfers, and administrative tasks",
        )
        .with_personas(&["Operations Specialist", "Account Administrator"])
        .with_triggers(&["Account update", "Transfer request", "Administrative change"])
        .with_tools(&[
            "account_maintenance",
            "transfer_processing",
            "record_management",
            "beneficiary_updates",
            "contact_management",
            "audit_logging",
        ]),
        WorkflowDefinition::new(
            "OPS002",
            "Trade Execution and Settlement",
            Operations,
            Sequential,
            Moderate,
            &[
                "Receive trade orders",
                "Validate order details",
                "Execute trades in market",
                "Monitor trade execution",
                "Confirm trade details",
                "Process settlement",
                "Update client records",
                "Generate trade confirmations",
            ],
        )
        .with_description("Trade processing from order entry through settlement")
        .with_personas(&["Trader", "Operations Specialist"])
        .with_triggers(&["Trade order", "Rebalancing request", "Investment decision"])
        .with_tools(&[
            "trade_validation",
            "order_execution",
            "settlement_processing",
            "record_updates",
            "confirmation_generation",
            "exception_handling",
        ]),
        // Coordinates other catalog workflows; the ids come from `sub_workflows` in the context.
        WorkflowDefinition::new(
            "OPS003",
            "Business Continuity Coordination",
            Operations,
            MasterOrchestration,
            Complex,
            &[
                "Assess operational disruption",
                "Activate continuity plan",
                "Coordinate advisor and operations teams",
                "Notify affected clients",
                "Restore critical services",
                "Document continuity response",
            ],
        )
        .with_description(
            "Company-wide coordination of advisor, client and operations workflows during a business disruption",
        )
        .with_personas(&["Chief Operating Officer", "Business Continuity Manager"])
        .with_triggers(&["Business disruption", "System outage", "Company-wide crisis"])
        .with_tools(&[
            "initiate_emergency_protocol",
            "crisis_communication",
            "system_status_check",
            "audit_logging",
        ]),
    ]
}
