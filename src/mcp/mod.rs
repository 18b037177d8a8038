//! Function-call protocol between the client and the MCP server.
//!
//! A client sends one [`FunctionCallRequest`] per call and receives one
//! [`FunctionCallResult`]. The server resolves the name through a
//! [`FunctionRegistry`], validates the arguments against the function's
//! [`FunctionSchema`], and runs the handler.
//!
//! ```json
//! POST /v1/mcp
//! { "function": "get_weather", "arguments": { "city": "深圳" } }
//!
//! 200 OK
//! { "result": { "city": "Shenzhen", "temperature": 28.1, "units": "celsius",
//!               "condition": "小雨", "humidity": 83 } }
//! ```
//!
//! Dispatch failures travel back as data (`{"error": {"kind", "message"}}`)
//! so the client can phrase them for the user.

pub mod registry;
pub mod types;

pub use registry::{
    DispatchError, FunctionHandler, FunctionRegistry, HandlerError, RegistrationError,
};
pub use types::{
    Arguments, CallFailure, ErrorKind, FunctionCallRequest, FunctionCallResult, FunctionList,
    FunctionSchema, MalformedRequestError, ParamDescriptor, ParamType,
};
