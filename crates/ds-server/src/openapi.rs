//! OpenAPI 3.1 specification for the DiaStat server.
//!
//! Served at `GET /v1/openapi.json`; `GET /` redirects here.

use serde_json::{json, Value};

pub fn openapi_spec() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "DiaStat Prediction API",
            "description": "Diabetes-risk prediction service: user registration, login and questionnaire scoring.",
            "version": ds_core::VERSION,
        },
        "paths": {
            "/register": {
                "post": {
                    "summary": "Register a user",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/RegisterRequest" } } }
                    },
                    "responses": {
                        "201": { "description": "User registered" },
                        "400": { "description": "Invalid fields or email already registered" },
                        "500": { "description": "Unexpected failure" }
                    }
                }
            },
            "/login": {
                "post": {
                    "summary": "Log a user in",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/LoginRequest" } } }
                    },
                    "responses": {
                        "200": { "description": "Login successful" },
                        "400": { "description": "Invalid email or password" },
                        "500": { "description": "Unexpected failure" }
                    }
                }
            },
            "/predict": {
                "post": {
                    "summary": "Score a symptom questionnaire",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Questionnaire" } } }
                    },
                    "responses": {
                        "200": {
                            "description": "Risk assessment",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/PredictResponse" } } }
                        },
                        "400": { "description": "Field out of range" },
                        "500": { "description": "Prediction processing error" }
                    }
                }
            },
            "/v1/health": {
                "get": {
                    "summary": "Server status",
                    "responses": { "200": { "description": "Status, version, uptime, request counters" } }
                }
            }
        },
        "components": {
            "schemas": {
                "RegisterRequest": {
                    "type": "object",
                    "required": ["first_name", "last_name", "gender", "email", "phone", "address", "password"],
                    "properties": {
                        "first_name": { "type": "string", "minLength": 1, "maxLength": 50 },
                        "last_name": { "type": "string", "minLength": 1, "maxLength": 50 },
                        "gender": { "type": "string", "enum": ["Male", "Female"] },
                        "email": { "type": "string", "format": "email" },
                        "phone": { "type": "string", "pattern": "^[0-9]{10,15}$" },
                        "address": { "type": "string", "minLength": 1, "maxLength": 100 },
                        "password": { "type": "string", "minLength": 6 }
                    }
                },
                "LoginRequest": {
                    "type": "object",
                    "required": ["email", "password"],
                    "properties": {
                        "email": { "type": "string", "format": "email" },
                        "password": { "type": "string" }
                    }
                },
                "Questionnaire": {
                    "type": "object",
                    "description": "16 integer-coded survey fields; age in (1, 65], everything else a 0/1 flag.",
                    "required": [
                        "age", "sex", "polyuria", "polydipsia", "suddenWeightLoss", "weakness",
                        "polyphagia", "genitalThrush", "visualBlurring", "itching", "irritability",
                        "delayedHealing", "partialParesis", "muscleStiffness", "alopecia", "obesity"
                    ],
                    "properties": {
                        "age": { "type": "integer", "minimum": 2, "maximum": 65 },
                        "sex": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "polyuria": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "polydipsia": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "suddenWeightLoss": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "weakness": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "polyphagia": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "genitalThrush": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "visualBlurring": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "itching": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "irritability": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "delayedHealing": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "partialParesis": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "muscleStiffness": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "alopecia": { "type": "integer", "minimum": 0, "maximum": 1 },
                        "obesity": { "type": "integer", "minimum": 0, "maximum": 1 }
                    }
                },
                "PredictResponse": {
                    "type": "object",
                    "properties": {
                        "diabetesStatus": { "type": "integer", "enum": [0, 1] },
                        "recommendation": { "type": "string" },
                        "probability": { "type": "number", "minimum": 0.0, "maximum": 1.0 }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_covers_every_route() {
        let spec = openapi_spec();
        let paths = spec["paths"].as_object().unwrap();
        for route in ["/register", "/login", "/predict", "/v1/health"] {
            assert!(paths.contains_key(route), "missing {route}");
        }
        assert_eq!(spec["info"]["version"], ds_core::VERSION);
    }
}
