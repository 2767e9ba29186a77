use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::auth::AuthStep;
use crate::error::TimeoutKind;
use crate::redirect::{Chain, ReceiveResult};
use crate::request::Request;
use crate::response::Response;
use crate::transport::AsyncTransport;
use crate::Error;

use super::{CallOptions, ClientBuilder, Prepared, RequestBuilder, Shared};

/// Builder of an [`AsyncClient`].
pub type AsyncClientBuilder = ClientBuilder<dyn AsyncTransport>;

/// Client for async code.
///
/// Each exchange is an await point, so many calls interleave on one task
/// runner. Admission is bounded: a call holds one of `max_in_flight` permits
/// from start to finish, and waits at most `pool_timeout` to get one.
#[derive(Clone)]
pub struct AsyncClient {
    shared: Arc<Shared<dyn AsyncTransport>>,
    permits: Arc<Semaphore>,
    pool_timeout: Duration,
}

impl ClientBuilder<dyn AsyncTransport> {
    /// Max concurrent calls. Defaults to 100.
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Max wait for admission. Defaults to 5 seconds.
    pub fn pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    /// Create the async client.
    pub fn build(self) -> Result<AsyncClient, Error> {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let pool_timeout = self.pool_timeout;

        Ok(AsyncClient {
            shared: Arc::new(self.into_shared()?),
            permits,
            pool_timeout,
        })
    }
}

impl AsyncClient {
    /// Configure a client that sends through `transport`.
    pub fn builder(transport: Arc<dyn AsyncTransport>) -> AsyncClientBuilder {
        ClientBuilder::new(transport)
    }

    /// The cookie jar of this client.
    pub fn cookies(&self) -> &crate::cookies::SharedJar {
        &self.shared.jar
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Start a request with `method`.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder<'_, Self> {
        RequestBuilder::new(self, self.shared.base_url.as_ref(), method, url)
    }

    verbs! {
        /// Start a `GET` request.
        get => GET,
        /// Start a `HEAD` request.
        head => HEAD,
        /// Start a `POST` request.
        post => POST,
        /// Start a `PUT` request.
        put => PUT,
        /// Start a `PATCH` request.
        patch => PATCH,
        /// Start a `DELETE` request.
        delete => DELETE,
        /// Start an `OPTIONS` request.
        options => OPTIONS,
    }

    /// Send a ready made request with the client defaults.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        self.execute(request, CallOptions::default()).await
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>, Error> {
        match tokio::time::timeout(self.pool_timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(Error::Timeout(
                TimeoutKind::Pool,
                "admission closed".into(),
            )),
            Err(_) => Err(Error::Timeout(
                TimeoutKind::Pool,
                format!("no permit within {:?}", self.pool_timeout),
            )),
        }
    }

    async fn execute(&self, request: Request, opts: CallOptions) -> Result<Response, Error> {
        // Held until this function returns, on every path.
        let _permit = self.admit().await?;
        trace!("Admitted, {} permits left", self.permits.available_permits());

        let shared = &*self.shared;

        let Prepared {
            mut request,
            mut flow,
            follow,
        } = shared.prepare(request, opts)?;

        if flow.requires_request_body() && request.body().is_stream() {
            let bytes = request.body_mut().read_all_async().await?;
            request.set_body(bytes);
        }

        flow.start(&mut request)?;

        let mut history = Vec::new();

        let mut response = loop {
            let mut response = self.exchange(&mut request).await?;

            if flow.requires_response_body() {
                response.read_async().await?;
            }

            let step = match flow.resume(&mut request, &response) {
                Ok(v) => v,
                Err(e) => {
                    response.close();
                    return Err(e);
                }
            };

            match step {
                AuthStep::Done => break response,
                AuthStep::SendRequest => {
                    debug!("Auth round after {}", response.status());
                    response.read_async().await?;
                    history.push(response);
                }
            }
        };

        let mut chain = Chain::new(request, history, shared.max_redirects, follow);

        loop {
            match chain.receive(response)? {
                ReceiveResult::Done(done) => return done.into_response(),
                ReceiveResult::Redirect(mut redirected) => {
                    if let Some(r) = redirected.response_mut() {
                        r.read_async().await?;
                    }

                    let mut next = {
                        let jar = shared.jar.lock();
                        redirected.proceed(&jar)?
                    };

                    response = self.exchange(next.request_mut()).await?;
                    chain = next;
                }
            }
        }
    }

    async fn exchange(&self, request: &mut Request) -> Result<Response, Error> {
        let transport = self.shared.before_send(request)?;
        let head = Arc::new(request.head());

        let mut response = transport.handle(request).await?;

        self.shared.after_receive(head, &mut response)?;

        Ok(response)
    }
}

impl RequestBuilder<'_, AsyncClient> {
    /// Perform the call.
    pub async fn send(self) -> Result<Response, Error> {
        let request = self.request?;
        self.client.execute(request, self.opts).await
    }
}

impl fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncClient")
            .field("router", &self.shared.router)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, Reply};

    #[tokio::test]
    async fn closed_admission_is_pool_error() {
        let mock = Arc::new(MockTransport::sequence([Reply::raw(
            "HTTP/1.1 200 OK\r\n\r\n",
        )]));
        let client = AsyncClient::builder(mock.clone())
            .trust_env(false)
            .build()
            .unwrap();

        client.permits.close();

        let err = client.get("https://q.test/").send().await.unwrap_err();
        assert_eq!(
            err,
            Error::Timeout(TimeoutKind::Pool, "admission closed".into())
        );
        assert_eq!(mock.count(), 0);
    }
}
