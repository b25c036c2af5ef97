use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use riskcheck_core::{Feature, RiskInput, RiskReport, Tier, SCORE_MAX};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, Transport};
use crate::error::ServerError;
use crate::framing::{
    is_frame_header, read_body, read_declared_length, skip_body, FrameError,
};
use crate::memo::{CacheStats, ReportCache};
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "riskcheck-server";
const TOOL_COMPUTE: &str = "risk_compute";
const TOOL_SCHEMA: &str = "risk_schema";
const TOOL_TIERS: &str = "risk_tiers";

/// Stateless front end for the engine. Safe to share across threads; the only
/// mutable parts are the memo cache and counters.
pub struct RiskServer {
    cache: Mutex<ReportCache>,
    metrics: Mutex<MetricsRegistry>,
    http_timeout: Duration,
}

#[derive(Debug, Default, Clone)]
struct ToolMetric {
    ok: u64,
    err: u64,
    total_latency_ms: f64,
    max_latency_ms: f64,
}

#[derive(Debug, Default)]
struct MetricsRegistry {
    tool: BTreeMap<&'static str, ToolMetric>,
    final_tier: BTreeMap<Tier, u64>,
    http_status: BTreeMap<u16, u64>,
    parse_errors: u64,
}

impl RiskServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            cache: Mutex::new(ReportCache::new(config.memo_capacity)),
            metrics: Mutex::new(MetricsRegistry::default()),
            http_timeout: config.http_timeout,
        }
    }

    pub fn serve(&self, config: &ServerConfig) -> Result<(), ServerError> {
        match config.transport {
            Transport::Stdio => self.serve_stdio(),
            Transport::Http => self.serve_http(&config.http_addr),
        }
    }

    /// Runs the engine through the memo cache and counts the final tier.
    pub fn compute(&self, input: RiskInput) -> RiskReport {
        let report = self.cache.lock().get_or_compute(input);
        let mut metrics = self.metrics.lock();
        let count = metrics.final_tier.entry(report.final_tier).or_default();
        *count = count.saturating_add(1);
        report
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        if request.is_notification() {
            debug!(method = %request.method, "notification ignored");
            return None;
        }

        let start = Instant::now();
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {
                            "tools": {
                                "listChanged": false
                            }
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found"),
        };
        debug!(
            method = %request.method,
            latency_ms = elapsed_ms(start),
            error = ?response.error_code(),
            "rpc handled"
        );

        Some(response)
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        let start = Instant::now();
        let (tool, response) = match parsed.name.as_str() {
            TOOL_COMPUTE => (TOOL_COMPUTE, self.exec_risk_compute(id, parsed.arguments)),
            TOOL_SCHEMA => (
                TOOL_SCHEMA,
                JsonRpcResponse::success(
                    id,
                    tool_result("input schema ready", schema_result()),
                ),
            ),
            TOOL_TIERS => (
                TOOL_TIERS,
                JsonRpcResponse::success(id, tool_result("tier table ready", tiers_result())),
            ),
            _ => (
                "unknown",
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, "unknown tool"),
            ),
        };
        self.record_tool_metrics(tool, elapsed_ms(start), response.error.is_some());
        response
    }

    fn exec_risk_compute(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let Some(arguments) = arguments else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "missing tool arguments");
        };
        let input = match parse_input(arguments) {
            Ok(v) => v,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };

        let report = self.compute(input);
        match serde_json::to_value(&report) {
            Ok(structured) => {
                JsonRpcResponse::success(id, tool_result(&report_summary(&report), structured))
            }
            Err(err) => JsonRpcResponse::error(
                id,
                INTERNAL_ERROR,
                format!("failed to serialize report: {err}"),
            ),
        }
    }

    fn record_tool_metrics(&self, tool: &'static str, latency_ms: f64, is_error: bool) {
        let mut locked = self.metrics.lock();
        let metric = locked.tool.entry(tool).or_default();
        if is_error {
            metric.err = metric.err.saturating_add(1);
        } else {
            metric.ok = metric.ok.saturating_add(1);
        }
        metric.total_latency_ms += latency_ms;
        metric.max_latency_ms = metric.max_latency_ms.max(latency_ms);
    }

    fn record_parse_error(&self) {
        let mut locked = self.metrics.lock();
        locked.parse_errors = locked.parse_errors.saturating_add(1);
    }

    fn record_http_status(&self, status: u16) {
        let mut locked = self.metrics.lock();
        let count = locked.http_status.entry(status).or_default();
        *count = count.saturating_add(1);
    }

    fn render_metrics_text(&self) -> String {
        let cache = self.cache_stats();
        let locked = self.metrics.lock();
        let mut lines = vec![
            "# TYPE riskcheck_tool_calls_total counter".to_string(),
            "# TYPE riskcheck_tool_latency_ms_sum counter".to_string(),
            "# TYPE riskcheck_tool_latency_ms_max gauge".to_string(),
        ];
        for (tool, metric) in &locked.tool {
            lines.push(format!(
                "riskcheck_tool_calls_total{{tool=\"{tool}\",status=\"ok\"}} {}",
                metric.ok
            ));
            lines.push(format!(
                "riskcheck_tool_calls_total{{tool=\"{tool}\",status=\"error\"}} {}",
                metric.err
            ));
            lines.push(format!(
                "riskcheck_tool_latency_ms_sum{{tool=\"{tool}\"}} {:.3}",
                metric.total_latency_ms
            ));
            lines.push(format!(
                "riskcheck_tool_latency_ms_max{{tool=\"{tool}\"}} {:.3}",
                metric.max_latency_ms
            ));
        }

        lines.push("# TYPE riskcheck_final_tier_total counter".to_string());
        for tier in Tier::ALL {
            lines.push(format!(
                "riskcheck_final_tier_total{{tier=\"{}\"}} {}",
                tier.level(),
                locked.final_tier.get(&tier).copied().unwrap_or(0)
            ));
        }

        lines.push("# TYPE riskcheck_http_responses_total counter".to_string());
        for (status, count) in &locked.http_status {
            lines.push(format!(
                "riskcheck_http_responses_total{{status=\"{status}\"}} {count}"
            ));
        }

        lines.push("# TYPE riskcheck_parse_errors_total counter".to_string());
        lines.push(format!("riskcheck_parse_errors_total {}", locked.parse_errors));
        lines.push("# TYPE riskcheck_memo_cache_hits_total counter".to_string());
        lines.push(format!("riskcheck_memo_cache_hits_total {}", cache.hits));
        lines.push("# TYPE riskcheck_memo_cache_misses_total counter".to_string());
        lines.push(format!("riskcheck_memo_cache_misses_total {}", cache.misses));
        lines.push("# TYPE riskcheck_memo_cache_evictions_total counter".to_string());
        lines.push(format!(
            "riskcheck_memo_cache_evictions_total {}",
            cache.evictions
        ));
        lines.push("# TYPE riskcheck_memo_cache_entries gauge".to_string());
        lines.push(format!("riskcheck_memo_cache_entries {}", cache.entries));
        lines.push("# TYPE riskcheck_memo_cache_capacity gauge".to_string());
        lines.push(format!("riskcheck_memo_cache_capacity {}", cache.capacity));
        lines.join("\n")
    }

    pub fn serve_stdio(&self) -> Result<(), ServerError> {
        let stdin = io::stdin();
        let mut reader = io::BufReader::new(stdin.lock());
        let mut stdout = io::stdout();
        let mut line = String::new();
        info!("riskcheck stdio transport ready");

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
            if trimmed.is_empty() {
                continue;
            }

            let (payload, frame) = if is_frame_header(trimmed) {
                let body = read_declared_length(&mut reader, Some(trimmed)).and_then(|declared| {
                    read_body(&mut reader, declared.ok_or(FrameError::MissingLength)?)
                });
                match body {
                    Ok(body) => (body, StdioFrame::ContentLength),
                    Err(err) => {
                        self.record_parse_error();
                        warn!(error = %err, "rejected stdio frame");
                        let response = JsonRpcResponse::error(
                            Value::Null,
                            PARSE_ERROR,
                            format!("invalid stdio frame: {err}"),
                        );
                        write_stdio_response(&mut stdout, &response, StdioFrame::ContentLength)?;
                        if let FrameError::TooLarge(len) = err {
                            skip_body(&mut reader, len)?;
                        }
                        continue;
                    }
                }
            } else {
                (trimmed.as_bytes().to_vec(), StdioFrame::LineDelimited)
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&payload) {
                Ok(v) => v,
                Err(err) => {
                    self.record_parse_error();
                    warn!(error = %err, "unparseable stdio request");
                    let response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
                    write_stdio_response(&mut stdout, &response, frame)?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request) {
                write_stdio_response(&mut stdout, &response, frame)?;
            }
        }

        info!("riskcheck stdio transport closed");
        Ok(())
    }

    pub fn serve_http(&self, addr: &str) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = %listener.local_addr()?, "riskcheck http listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = self.handle_http_connection(stream) {
                        warn!(error = %err, "http request failed");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "http accept failed");
                }
            }
        }
        Ok(())
    }

    fn handle_http_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        // connections are served one at a time, so a silent peer must not hold the loop
        stream.set_read_timeout(Some(self.http_timeout))?;
        stream.set_write_timeout(Some(self.http_timeout))?;
        let mut reader = io::BufReader::new(stream.try_clone()?);

        let start = Instant::now();
        let response = match read_http_request(&mut reader) {
            Ok(None) => return Ok(()),
            Ok(Some(req)) => {
                let method = req.method.clone();
                let path = req.path.clone();
                let response = self.dispatch_http_request(req);
                debug!(
                    %method,
                    %path,
                    status = response.status,
                    latency_ms = elapsed_ms(start),
                    "http handled"
                );
                response
            }
            Err(FrameError::Io(err)) => return Err(err),
            Err(err @ FrameError::TooLarge(_)) => {
                self.record_parse_error();
                HttpResponse::json(
                    413,
                    json!({"error":"payload_too_large","message": err.to_string()}),
                )
            }
            Err(err) => {
                self.record_parse_error();
                HttpResponse::json(
                    400,
                    json!({"error":"invalid_request","message": err.to_string()}),
                )
            }
        };
        self.record_http_status(response.status);
        write_http_response(&mut stream, response)
    }

    fn dispatch_http_request(&self, req: HttpRequest) -> HttpResponse {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => HttpResponse::json(200, json!({"status":"ok"})),
            ("GET", "/metrics") => HttpResponse::text(
                200,
                "text/plain; version=0.0.4; charset=utf-8",
                self.render_metrics_text(),
            ),
            ("GET", "/v1/schema") => HttpResponse::json(200, schema_result()),
            ("GET", "/v1/tiers") => HttpResponse::json(200, tiers_result()),
            ("POST", "/v1/risk") => self.http_compute(&req.body),
            ("POST", "/rpc" | "/") => self.http_rpc(&req.body),
            ("GET" | "POST", _) => HttpResponse::json(
                404,
                json!({"error":"not_found","message":"supported endpoints: GET /health, GET /metrics, GET /v1/schema, GET /v1/tiers, POST /v1/risk, POST /rpc"}),
            ),
            _ => HttpResponse::json(
                405,
                json!({"error":"method_not_allowed","message":"use GET or POST"}),
            ),
        }
    }

    fn http_compute(&self, body: &[u8]) -> HttpResponse {
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(err) => {
                self.record_parse_error();
                return HttpResponse::json(
                    400,
                    json!({"error":"invalid_json","message": format!("parse error: {err}")}),
                );
            }
        };

        let start = Instant::now();
        let input = match parse_input(value) {
            Ok(v) => v,
            Err(message) => {
                self.record_tool_metrics(TOOL_COMPUTE, elapsed_ms(start), true);
                return HttpResponse::json(
                    422,
                    json!({"error":"invalid_input","message": message}),
                );
            }
        };

        let report = self.compute(input);
        self.record_tool_metrics(TOOL_COMPUTE, elapsed_ms(start), false);
        match serde_json::to_value(&report) {
            Ok(payload) => HttpResponse::json(200, payload),
            Err(_) => HttpResponse::json(
                500,
                json!({"error":"internal_error","message":"failed to serialize report"}),
            ),
        }
    }

    fn http_rpc(&self, body: &[u8]) -> HttpResponse {
        let rpc: JsonRpcRequest = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(err) => {
                self.record_parse_error();
                return HttpResponse::json(
                    400,
                    json!({"jsonrpc":"2.0","id": Value::Null, "error":{"code": PARSE_ERROR,"message": format!("parse error: {err}")}}),
                );
            }
        };
        match self.handle_request(rpc) {
            Some(v) => match serde_json::to_value(v) {
                Ok(payload) => HttpResponse::json(200, payload),
                Err(_) => HttpResponse::json(
                    500,
                    json!({"error":"internal_error","message":"failed to serialize rpc response"}),
                ),
            },
            None => HttpResponse::empty(204),
        }
    }
}

impl Default for RiskServer {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}

fn parse_input(value: Value) -> Result<RiskInput, String> {
    let input: RiskInput =
        serde_json::from_value(value).map_err(|err| format!("invalid input: {err}"))?;
    input
        .validate()
        .map_err(|err| format!("invalid input: {err}"))?;
    Ok(input)
}

fn report_summary(report: &RiskReport) -> String {
    format!(
        "{} Risk ({}): score {:.2}/{SCORE_MAX}, 30d {:.1}%, 60d {:.1}%, 90d {:.1}%",
        report.risk_category,
        report.final_tier,
        report.final_score,
        report.p30,
        report.p60,
        report.p90
    )
}

fn tool_result(text: &str, structured: Value) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "structuredContent": structured
    })
}

fn input_schema() -> Value {
    let properties = Feature::ALL
        .into_iter()
        .map(|feature| {
            let bounds = feature.bounds();
            (
                feature.name().to_string(),
                json!({
                    "type": "number",
                    "description": feature.label(),
                    "minimum": bounds.min,
                    "maximum": bounds.max
                }),
            )
        })
        .collect::<serde_json::Map<_, _>>();
    json!({
        "type": "object",
        "required": Feature::ALL.map(Feature::name),
        "properties": properties
    })
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_COMPUTE,
                "description": "Score eight health indicators into 30/60/90-day risk, tiers, final score and care plan. Out-of-range values are clamped.",
                "inputSchema": input_schema()
            },
            {
                "name": TOOL_SCHEMA,
                "description": "Describe the accepted input fields with their ranges, units, steps and defaults.",
                "inputSchema": {"type": "object", "properties": {}}
            },
            {
                "name": TOOL_TIERS,
                "description": "List the five severity tiers with their bands, categories, colors and care plans.",
                "inputSchema": {"type": "object", "properties": {}}
            }
        ]
    })
}

fn schema_result() -> Value {
    json!({
        "fields": Feature::ALL.map(|feature| {
            let bounds = feature.bounds();
            json!({
                "name": feature.name(),
                "label": feature.label(),
                "unit": feature.unit(),
                "min": bounds.min,
                "max": bounds.max,
                "step": feature.step(),
                "default": feature.default_value()
            })
        })
    })
}

fn tiers_result() -> Value {
    json!({
        "scoreMax": SCORE_MAX,
        "tiers": Tier::ALL.map(|tier| {
            json!({
                "level": tier.level(),
                "category": tier.category().label(),
                "color": tier.color(),
                "band": tier.band(),
                "carePlan": tier.care_plan()
            })
        })
    })
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, value: Value) -> Self {
        let body = serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            body: body.into_bytes(),
        }
    }

    const fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: Vec::new(),
        }
    }
}

fn read_http_request<R: BufRead>(reader: &mut R) -> Result<Option<HttpRequest>, FrameError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let first = line.trim_end_matches(['\r', '\n']);
    if first.is_empty() {
        return Ok(None);
    }

    let mut parts = first.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "malformed http request line").into());
    };
    let method = method.to_ascii_uppercase();
    let path = request_path(target).to_string();

    let content_length = read_declared_length(reader, None)?.unwrap_or(0);
    let body = read_body(reader, content_length)?;
    Ok(Some(HttpRequest { method, path, body }))
}

/// Path part of a request target, without query string.
fn request_path(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}

fn write_http_response(stream: &mut TcpStream, response: HttpResponse) -> io::Result<()> {
    let reason = http_reason_phrase(response.status);
    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

const fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

#[derive(Clone, Copy)]
enum StdioFrame {
    LineDelimited,
    ContentLength,
}

fn write_stdio_response(
    stdout: &mut io::Stdout,
    response: &JsonRpcResponse,
    frame: StdioFrame,
) -> Result<(), ServerError> {
    match frame {
        StdioFrame::LineDelimited => {
            let serialized = serde_json::to_string(response)?;
            writeln!(stdout, "{serialized}")?;
        }
        StdioFrame::ContentLength => {
            let serialized = serde_json::to_vec(response)?;
            write!(stdout, "Content-Length: {}\r\n\r\n", serialized.len())?;
            stdout.write_all(&serialized)?;
        }
    }
    stdout.flush()?;
    Ok(())
}
