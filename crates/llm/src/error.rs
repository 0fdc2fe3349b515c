use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ModelError {
    #[snafu(display("model '{model}' is not available"))]
    Unavailable {
        stage: &'static str,
        model: String,
    },
    #[snafu(display("stream request has an empty prompt"))]
    EmptyPrompt { stage: &'static str },
}

pub type ModelResult<T> = Result<T, ModelError>;
