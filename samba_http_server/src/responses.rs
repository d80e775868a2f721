use rocket::{
    http::Status,
    response::{self, Responder},
    serde::{Deserialize, Serialize},
};
use std::io::Cursor;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(crate = "rocket::serde")]
#[serde(tag = "error", content = "args")]
pub(crate) enum Error {
    UnexpectedWireFormat(String),
    UnknownAlgorithm(String),
    TraceRequestRejected(String),
    InvalidTrace(String),
    NoSuchTraceId { trace_id: String },
    Internal { message: String },
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> response::Result<'o> {
        let string =
            serde_json::to_string(&self).map_err(|_| rocket::http::Status::InternalServerError)?;

        rocket::Response::build()
            .header(rocket::http::ContentType::JSON)
            .sized_body(string.len(), Cursor::new(string))
            .status(self.status())
            .ok()
    }
}

impl Error {
    fn status(&self) -> Status {
        match self {
            Error::UnexpectedWireFormat(_) => Status::BadRequest,
            Error::UnknownAlgorithm(_) => Status::BadRequest,
            Error::TraceRequestRejected(_) => Status::BadRequest,
            Error::NoSuchTraceId { .. } => Status::NotFound,
            Error::InvalidTrace(_) => Status::InternalServerError,
            Error::Internal { .. } => Status::InternalServerError,
        }
    }
}

impl From<samba::TraceError> for Error {
    fn from(e: samba::TraceError) -> Self {
        Error::InvalidTrace(e.to_string())
    }
}
