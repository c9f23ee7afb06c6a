use std::sync::Arc;

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    models::{bar::Bar, date_range::DateRange, granularity::Granularity, tick::Tick},
    providers::{
        ErrorClass, HistoryProvider, ProviderError, ProviderInitError, RetriesExhaustedSnafu,
        activetick::{
            params::{ActiveTickConfig, bars_uri, ticks_uri},
            response::{classify, parse_bars, parse_ticks},
        },
        transport::{ReqwestTransport, Transport},
    },
};

pub struct ActiveTickProvider {
    transport: Arc<dyn Transport>,
    config: ActiveTickConfig,
    base_url: String,
}

impl ActiveTickProvider {
    /// Creates a provider that talks HTTP through `reqwest`.
    pub fn new(config: ActiveTickConfig) -> Result<Self, ProviderInitError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a provider on top of any [`Transport`].
    pub fn with_transport(config: ActiveTickConfig, transport: Arc<dyn Transport>) -> Self {
        let base_url = config.base_url();
        Self {
            transport,
            config,
            base_url,
        }
    }

    pub fn config(&self) -> &ActiveTickConfig {
        &self.config
    }

    /// GETs `uri`, retrying transient failures up to the configured ceiling.
    async fn get_raw(&self, uri: &str) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, uri);
        let retry = self.config.retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self.transport.get(&url).await;
            let err = match classify(outcome, &url) {
                Ok(body) => {
                    debug!(%url, attempt, bytes = body.len(), "feed responded");
                    return Ok(body);
                }
                Err(err) => err,
            };
            match err.class() {
                ErrorClass::Transient if attempt < retry.max_attempts() => {
                    warn!(%url, attempt, error = %err, "transient feed failure, retrying");
                    retry.pause(attempt).await;
                }
                ErrorClass::Transient => {
                    return Err(err).context(RetriesExhaustedSnafu {
                        url,
                        attempts: attempt,
                    });
                }
                ErrorClass::Fatal | ErrorClass::Soft => return Err(err),
            }
        }
    }
}

#[async_trait]
impl HistoryProvider for ActiveTickProvider {
    async fn fetch_bars(
        &self,
        symbol: &str,
        granularity: Granularity,
        range: DateRange,
    ) -> Result<Vec<Bar>, ProviderError> {
        let uri = bars_uri(symbol, granularity, &range, &self.config.time_format)?;
        let raw = self.get_raw(&uri).await?;
        parse_bars(&raw, &self.config.time_format)
    }

    async fn fetch_ticks(
        &self,
        symbol: &str,
        range: DateRange,
        trades: bool,
        quotes: bool,
    ) -> Result<Vec<Tick>, ProviderError> {
        let uri = ticks_uri(symbol, &range, trades, quotes, &self.config.time_format)?;
        let raw = self.get_raw(&uri).await?;
        parse_ticks(&raw, &self.config.time_format)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::providers::{
        retry::{Backoff, RetryPolicy},
        transport::{TransportError, TransportResponse},
    };

    /// Replays canned outcomes and records every URL it was asked for.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        fallback: Result<TransportResponse, TransportError>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn always(outcome: Result<TransportResponse, TransportError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: outcome,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn then(self, outcome: Result<TransportResponse, TransportError>) -> Self {
            self.script.lock().unwrap().push_back(outcome);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
            self.calls.lock().unwrap().push(url.to_string());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn provider(attempts: u32, transport: Arc<ScriptedTransport>) -> ActiveTickProvider {
        let config = ActiveTickConfig {
            host: "feed".into(),
            port: 84,
            retry: RetryPolicy::new(attempts, Backoff::None),
            ..Default::default()
        };
        ActiveTickProvider::with_transport(config, transport)
    }

    fn day() -> DateRange {
        DateRange::day(NaiveDate::from_ymd_opt(2018, 11, 1).unwrap())
    }

    #[tokio::test]
    async fn transient_failures_use_exactly_the_ceiling() {
        let transport = Arc::new(ScriptedTransport::always(Err(TransportError::Other(
            "connection reset".into(),
        ))));
        let p = provider(4, transport.clone());

        let err = p.fetch_bars("AAPL", Granularity::Daily, day()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 4);
        match err {
            ProviderError::RetriesExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, ProviderError::Transient { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_source_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::always(Err(
            TransportError::ConnectionRefused("refused".into()),
        )));
        let p = provider(5, transport.clone());

        let err = p.fetch_ticks("AAPL", day(), true, true).await.unwrap_err();

        assert_eq!(transport.calls().len(), 1);
        assert!(matches!(err, ProviderError::SourceUnreachable { .. }));
    }

    #[tokio::test]
    async fn empty_result_and_bad_status_abort_immediately() {
        let empty = Arc::new(ScriptedTransport::always(Ok(TransportResponse::ok("0"))));
        let err = provider(3, empty.clone())
            .fetch_ticks("AAPL", day(), true, false)
            .await
            .unwrap_err();
        assert!(err.is_soft());
        assert_eq!(empty.calls().len(), 1);

        let status = Arc::new(ScriptedTransport::always(Ok(TransportResponse {
            status: 404,
            body: String::new(),
        })));
        let err = provider(3, status.clone())
            .fetch_bars("AAPL", Granularity::Daily, day())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedStatus { code: 404, .. }));
        assert_eq!(status.calls().len(), 1);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let transport = Arc::new(
            ScriptedTransport::always(Ok(TransportResponse::ok(
                "20181101000000,271.60,273.73,270.38,273.37,89496311\r\n",
            )))
            .then(Err(TransportError::Other("timeout".into()))),
        );
        let p = provider(3, transport.clone());

        let bars = p.fetch_bars("aapl", Granularity::Daily, day()).await.unwrap();

        assert_eq!(bars.len(), 1);
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            "http://feed/barData?symbol=AAPL&historyType=1&beginTime=20181101000000&endTime=20181101000000"
        );
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_the_network() {
        let transport = Arc::new(ScriptedTransport::always(Ok(TransportResponse::ok("x"))));
        let p = provider(3, transport.clone());

        let err = p.fetch_ticks("AAPL", day(), false, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));

        let err = p
            .fetch_bars("AAPL", Granularity::Intraday(0), day())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidGranularity { .. }));

        assert!(transport.calls().is_empty());
    }
}
