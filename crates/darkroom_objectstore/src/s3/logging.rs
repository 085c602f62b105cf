use http::StatusCode;

fn response_level(status: StatusCode) -> tracing::Level {
    if status.is_success() {
        tracing::Level::TRACE
    } else {
        tracing::Level::DEBUG
    }
}

/// Emits one event per S3 request and response. Failed responses are raised to debug.
#[derive(Debug)]
pub(crate) struct LoggingInterceptor;

impl aws_sdk_s3::config::Interceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        "DarkroomLoggingInterceptor"
    }

    fn read_after_serialization(
        &self,
        context: &aws_sdk_s3::config::interceptors::BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &aws_sdk_s3::config::RuntimeComponents,
        _cfg: &mut aws_sdk_s3::config::ConfigBag,
    ) -> Result<(), aws_sdk_s3::error::BoxError> {
        let request = context.request();
        tracing::trace!(
            method = %request.method(),
            uri = %request.uri(),
            "s3 request"
        );
        Ok(())
    }

    fn read_after_deserialization(
        &self,
        context: &aws_sdk_s3::config::interceptors::AfterDeserializationInterceptorContextRef<'_>,
        _runtime_components: &aws_sdk_s3::config::RuntimeComponents,
        _cfg: &mut aws_sdk_s3::config::ConfigBag,
    ) -> Result<(), aws_sdk_s3::error::BoxError> {
        let status = context.response().status();
        if response_level(status) == tracing::Level::TRACE {
            tracing::trace!(status = %status, "s3 response");
        } else {
            tracing::debug!(status = %status, "s3 response");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::ok(StatusCode::OK, tracing::Level::TRACE)]
    #[case::no_content(StatusCode::NO_CONTENT, tracing::Level::TRACE)]
    #[case::not_found(StatusCode::NOT_FOUND, tracing::Level::DEBUG)]
    #[case::server_error(StatusCode::SERVICE_UNAVAILABLE, tracing::Level::DEBUG)]
    fn failed_responses_are_raised(#[case] status: StatusCode, #[case] expected: tracing::Level) {
        assert_eq!(response_level(status), expected);
    }
}
