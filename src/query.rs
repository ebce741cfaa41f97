use serde::Serialize;

use crate::domain::Technique;
use crate::error::TrendsError;

const METHOD_ATTRIBUTE: &str = "rcsb_entry_info.experimental_method";
const RELEASE_DATE_ATTRIBUTE: &str = "rcsb_accession_info.initial_release_date";

/// Faceted RCSB search request. Asks for zero rows and two nested
/// aggregations: release year, then experimental method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub query: QueryNode,
    pub return_type: ReturnType,
    pub request_options: RequestOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryNode {
    Group {
        nodes: Vec<QueryNode>,
        logical_operator: LogicalOperator,
    },
    Terminal {
        service: Service,
        parameters: TerminalParameters,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Entry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalParameters {
    pub attribute: String,
    pub operator: Operator,
    pub value: TerminalValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    ExactMatch,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TerminalValue {
    Text(String),
    Range(DateRange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
    pub include_lower: bool,
    pub include_upper: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOptions {
    pub paginate: Paginate,
    pub facets: Vec<FacetRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginate {
    pub start: u32,
    pub rows: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetRequest {
    pub name: String,
    pub aggregation_type: AggregationType,
    pub attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    pub min_interval_population: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<FacetRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    DateHistogram,
    Terms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Year,
}

impl SearchQuery {
    pub fn for_technique(technique: Technique, year: Option<i32>) -> Self {
        let mut nodes = vec![QueryNode::Terminal {
            service: Service::Text,
            parameters: TerminalParameters {
                attribute: METHOD_ATTRIBUTE.to_string(),
                operator: Operator::ExactMatch,
                value: TerminalValue::Text(technique.code().to_string()),
            },
        }];

        let logical_operator = match year {
            Some(year) => {
                nodes.push(QueryNode::Terminal {
                    service: Service::Text,
                    parameters: TerminalParameters {
                        attribute: RELEASE_DATE_ATTRIBUTE.to_string(),
                        operator: Operator::Range,
                        value: TerminalValue::Range(DateRange {
                            from: format!("{year}-01-01"),
                            to: format!("{}-01-01", year + 1),
                            include_lower: true,
                            include_upper: false,
                        }),
                    },
                });
                LogicalOperator::And
            }
            None => LogicalOperator::Or,
        };

        Self {
            query: QueryNode::Group {
                nodes,
                logical_operator,
            },
            return_type: ReturnType::Entry,
            request_options: RequestOptions {
                paginate: Paginate { start: 0, rows: 0 },
                facets: vec![FacetRequest {
                    name: "Release Date".to_string(),
                    aggregation_type: AggregationType::DateHistogram,
                    attribute: RELEASE_DATE_ATTRIBUTE.to_string(),
                    interval: Some(Interval::Year),
                    min_interval_population: 1,
                    facets: vec![FacetRequest {
                        name: "Experimental Method".to_string(),
                        aggregation_type: AggregationType::Terms,
                        attribute: METHOD_ATTRIBUTE.to_string(),
                        interval: None,
                        min_interval_population: 1,
                        facets: Vec::new(),
                    }],
                }],
            },
        }
    }

    pub fn to_json(&self) -> Result<String, TrendsError> {
        serde_json::to_string(self).map_err(|err| TrendsError::QueryEncode(err.to_string()))
    }
}

/// Solr row-count query against the PDBe search index for one
/// (technique, year) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub technique: Technique,
    pub year: i32,
}

impl RowQuery {
    pub fn new(technique: Technique, year: i32) -> Self {
        Self { technique, year }
    }

    pub fn q(&self) -> String {
        let method = match self.technique.pdbe_labels() {
            [label] => format!("\"{label}\""),
            labels => {
                let quoted = labels
                    .iter()
                    .map(|label| format!("\"{label}\""))
                    .collect::<Vec<_>>();
                format!("({})", quoted.join(" OR "))
            }
        };
        format!("release_year:\"{}\" AND experimental_method:{method}", self.year)
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.q()),
            ("wt", "json".to_string()),
            ("rows", "0".to_string()),
        ]
    }
}
