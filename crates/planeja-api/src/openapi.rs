//! OpenAPI documentation
//!
//! Provides OpenAPI 3.0 specification and Swagger UI for the Planeja+ API.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

/// OpenAPI JSON specification endpoint
async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

/// Swagger UI HTML endpoint
async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// A transition endpoint on one invitation
fn invitation_action(operation_id: &str, summary: &str, errors: &[&str]) -> serde_json::Value {
    let mut responses = serde_json::Map::new();
    responses.insert(
        "200".to_string(),
        json!({
            "description": "Updated invitation",
            "content": {
                "application/json": {
                    "schema": {"$ref": "#/components/schemas/Invitation"}
                }
            }
        }),
    );
    for code in errors {
        responses.insert(code.to_string(), json!({"$ref": format!("#/components/responses/{}", code)}));
    }

    json!({
        "post": {
            "tags": ["invitations"],
            "summary": summary,
            "operationId": operation_id,
            "parameters": [{"$ref": "#/components/parameters/InvitationId"}],
            "responses": responses
        }
    })
}

/// Get the OpenAPI specification as JSON
fn get_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Planeja+ API",
            "description": "REST API for Planeja+ invitations and reports\n\n## Authentication\n\nEvery endpoint except health checks identifies the caller through headers.\n\n- `X-User-Id: <uuid>`\n- `X-User-Email: <address>`\n- `X-User-Name: <display name>` (optional)\n\nWhen an API key is configured it must also be sent:\n\n- **Header**: `X-API-Key: <your-api-key>`\n- **Bearer**: `Authorization: Bearer <your-api-key>`",
            "version": "1.0.0"
        },
        "servers": [
            {
                "url": "/api/v1",
                "description": "API v1"
            }
        ],
        "tags": [
            {"name": "health", "description": "Health check endpoints"},
            {"name": "invitations", "description": "Project and team invitations"},
            {"name": "reports", "description": "Analytics reports and exports"}
        ],
        "paths": {
            // Invitation endpoints
            "/invitations": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "List sent or received invitations",
                    "operationId": "listInvitations",
                    "parameters": [
                        {
                            "name": "box",
                            "in": "query",
                            "schema": {"type": "string", "enum": ["sent", "received"], "default": "received"}
                        },
                        {
                            "name": "status",
                            "in": "query",
                            "schema": {"$ref": "#/components/schemas/InvitationStatus"}
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Invitations, newest first",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/InvitationList"}
                                }
                            }
                        },
                        "422": {"$ref": "#/components/responses/422"}
                    }
                },
                "post": {
                    "tags": ["invitations"],
                    "summary": "Send an invitation",
                    "operationId": "sendInvitation",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/SendInvitationRequest"}
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "Invitation created",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Invitation"}
                                }
                            }
                        },
                        "409": {"$ref": "#/components/responses/409"},
                        "422": {"$ref": "#/components/responses/422"},
                        "429": {"$ref": "#/components/responses/429"}
                    }
                }
            },
            "/invitations/stats": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "Invitation counts and remaining send quota",
                    "operationId": "getInvitationStats",
                    "responses": {
                        "200": {
                            "description": "Counts per status for both boxes",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/InvitationStats"}
                                }
                            }
                        }
                    }
                }
            },
            "/invitations/activities": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "Recent activity involving the caller",
                    "operationId": "listActivities",
                    "parameters": [
                        {
                            "name": "limit",
                            "in": "query",
                            "schema": {"type": "integer", "default": 50, "maximum": 200}
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Activities, newest first",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ActivityList"}
                                }
                            }
                        }
                    }
                },
                "delete": {
                    "tags": ["invitations"],
                    "summary": "Clear the activity log",
                    "description": "Refused with 403 unless invitations.allow_activity_clear is set",
                    "operationId": "clearActivities",
                    "responses": {
                        "403": {"$ref": "#/components/responses/403"},
                        "200": {
                            "description": "Number of removed entries",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {"removed": {"type": "integer"}}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/invitations/{id}": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "Get an invitation",
                    "operationId": "getInvitation",
                    "parameters": [{"$ref": "#/components/parameters/InvitationId"}],
                    "responses": {
                        "200": {
                            "description": "Invitation",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Invitation"}
                                }
                            }
                        },
                        "403": {"$ref": "#/components/responses/403"},
                        "404": {"$ref": "#/components/responses/404"}
                    }
                }
            },
            "/invitations/{id}/activities": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "History of one invitation",
                    "operationId": "getInvitationActivities",
                    "parameters": [{"$ref": "#/components/parameters/InvitationId"}],
                    "responses": {
                        "200": {
                            "description": "Activities, oldest first",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ActivityList"}
                                }
                            }
                        },
                        "404": {"$ref": "#/components/responses/404"}
                    }
                }
            },
            "/invitations/{id}/accept": invitation_action(
                "acceptInvitation",
                "Accept an invitation as its recipient",
                &["403", "404", "409", "410"]
            ),
            "/invitations/{id}/reject": invitation_action(
                "rejectInvitation",
                "Reject an invitation as its recipient",
                &["403", "404", "409", "410"]
            ),
            "/invitations/{id}/cancel": invitation_action(
                "cancelInvitation",
                "Cancel an invitation as its sender",
                &["403", "404", "409"]
            ),
            "/invitations/{id}/resend": invitation_action(
                "resendInvitation",
                "Extend and resend a pending or expired invitation",
                &["403", "404", "409", "429"]
            ),
            "/invitations/target/{kind}/{id}": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "Invitations to a project or team that the caller sent or received",
                    "operationId": "listInvitationsForTarget",
                    "parameters": [
                        {
                            "name": "kind",
                            "in": "path",
                            "required": true,
                            "schema": {"type": "string", "enum": ["project", "team"]}
                        },
                        {
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": {"type": "string", "format": "uuid"}
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Invitations, newest first",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/InvitationList"}
                                }
                            }
                        },
                        "422": {"$ref": "#/components/responses/422"}
                    }
                }
            },
            "/invitations/token/{token}": {
                "get": {
                    "tags": ["invitations"],
                    "summary": "Look up an invitation by its shareable link",
                    "operationId": "getInvitationByToken",
                    "parameters": [{"$ref": "#/components/parameters/LinkToken"}],
                    "responses": {
                        "200": {
                            "description": "Invitation",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Invitation"}
                                }
                            }
                        },
                        "404": {"$ref": "#/components/responses/404"}
                    }
                }
            },
            "/invitations/token/{token}/accept": {
                "post": {
                    "tags": ["invitations"],
                    "summary": "Accept an invitation through its shareable link",
                    "operationId": "acceptInvitationByToken",
                    "parameters": [{"$ref": "#/components/parameters/LinkToken"}],
                    "responses": {
                        "200": {
                            "description": "Accepted invitation",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Invitation"}
                                }
                            }
                        },
                        "404": {"$ref": "#/components/responses/404"},
                        "409": {"$ref": "#/components/responses/409"},
                        "410": {"$ref": "#/components/responses/410"}
                    }
                }
            },
            // Report endpoints
            "/reports": {
                "post": {
                    "tags": ["reports"],
                    "summary": "Compute a report",
                    "operationId": "computeReport",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/ReportFilters"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Charts, tables and KPIs for the filters",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ReportData"}
                                }
                            }
                        },
                        "422": {"$ref": "#/components/responses/422"}
                    }
                }
            },
            "/reports/drilldown": {
                "post": {
                    "tags": ["reports"],
                    "summary": "Tasks behind a chart element",
                    "operationId": "drillDown",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["target"],
                                    "properties": {
                                        "filters": {"$ref": "#/components/schemas/ReportFilters"},
                                        "target": {"$ref": "#/components/schemas/DrillDownTarget"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Matching tasks",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "tasks": {"type": "array", "items": {"type": "object"}},
                                            "total": {"type": "integer"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/reports/export/tasks": {
                "post": {
                    "tags": ["reports"],
                    "summary": "Export filtered tasks as CSV",
                    "operationId": "exportTasks",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "filters": {"$ref": "#/components/schemas/ReportFilters"},
                                        "target": {"$ref": "#/components/schemas/DrillDownTarget"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "CSV attachment",
                            "content": {"text/csv": {"schema": {"type": "string"}}}
                        }
                    }
                }
            },
            "/reports/export/teams": {
                "post": {
                    "tags": ["reports"],
                    "summary": "Export team productivity as CSV",
                    "operationId": "exportTeams",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/ReportFilters"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "CSV attachment",
                            "content": {"text/csv": {"schema": {"type": "string"}}}
                        }
                    }
                }
            }
        },
        "components": {
            "parameters": {
                "InvitationId": {
                    "name": "id",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "string", "format": "uuid"}
                },
                "LinkToken": {
                    "name": "token",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "string"}
                }
            },
            "responses": {
                "403": {"description": "Caller may not act on this invitation", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}},
                "404": {"description": "Invitation not found", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}},
                "409": {"description": "Duplicate or no longer pending", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}},
                "410": {"description": "Invitation expired", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}},
                "422": {"description": "Validation failed", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}},
                "429": {
                    "description": "Send rate limit reached",
                    "headers": {"Retry-After": {"schema": {"type": "integer"}}},
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
                }
            },
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "properties": {
                        "error": {"type": "string"},
                        "message": {"type": "string"},
                        "retry_after_secs": {"type": "integer"}
                    }
                },
                "InvitationStatus": {
                    "type": "string",
                    "enum": ["pending", "accepted", "rejected", "cancelled", "expired"]
                },
                "InvitationTarget": {
                    "type": "object",
                    "required": ["kind", "id", "name"],
                    "properties": {
                        "kind": {"type": "string", "enum": ["project", "team"]},
                        "id": {"type": "string", "format": "uuid"},
                        "name": {"type": "string"}
                    }
                },
                "SendInvitationRequest": {
                    "type": "object",
                    "required": ["recipient_email", "role", "target"],
                    "properties": {
                        "recipient_email": {"type": "string", "format": "email"},
                        "role": {"type": "string", "enum": ["owner", "admin", "member", "observer"]},
                        "target": {"$ref": "#/components/schemas/InvitationTarget"},
                        "team_names": {"type": "array", "items": {"type": "string"}},
                        "message": {"type": "string", "maxLength": 1000},
                        "expiration_days": {"type": "integer", "minimum": 1},
                        "generate_link": {"type": "boolean"}
                    }
                },
                "Invitation": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "sender_id": {"type": "string", "format": "uuid"},
                        "sender_name": {"type": "string"},
                        "sender_email": {"type": "string"},
                        "recipient_email": {"type": "string"},
                        "recipient_id": {"type": "string", "format": "uuid"},
                        "target": {"$ref": "#/components/schemas/InvitationTarget"},
                        "role": {"type": "string"},
                        "team_names": {"type": "array", "items": {"type": "string"}},
                        "message": {"type": "string"},
                        "status": {"$ref": "#/components/schemas/InvitationStatus"},
                        "created_at": {"type": "string", "format": "date-time"},
                        "expires_at": {"type": "string", "format": "date-time"},
                        "accepted_at": {"type": "string", "format": "date-time"},
                        "rejected_at": {"type": "string", "format": "date-time"},
                        "cancelled_at": {"type": "string", "format": "date-time"},
                        "share_link": {"type": "string", "description": "Only present for the sender"}
                    }
                },
                "InvitationList": {
                    "type": "object",
                    "properties": {
                        "data": {"type": "array", "items": {"$ref": "#/components/schemas/Invitation"}},
                        "total": {"type": "integer"}
                    }
                },
                "InvitationStats": {
                    "type": "object",
                    "properties": {
                        "sent": {"type": "object"},
                        "received": {"type": "object"},
                        "rate_limit": {
                            "type": "object",
                            "properties": {
                                "remaining": {"type": "integer"},
                                "limit": {"type": "integer"},
                                "blocked_for_secs": {"type": "integer"}
                            }
                        }
                    }
                },
                "ActivityList": {
                    "type": "object",
                    "properties": {
                        "data": {"type": "array", "items": {"type": "object"}},
                        "total": {"type": "integer"}
                    }
                },
                "ReportFilters": {
                    "type": "object",
                    "properties": {
                        "period": {
                            "type": "object",
                            "description": "{\"kind\": \"day|week|month|quarter|year\"} or {\"kind\": \"custom\", \"start\": date, \"end\": date}"
                        },
                        "project_ids": {"type": "array", "items": {"type": "string", "format": "uuid"}},
                        "team_ids": {"type": "array", "items": {"type": "string", "format": "uuid"}},
                        "member_ids": {"type": "array", "items": {"type": "string", "format": "uuid"}},
                        "status": {"type": "string", "enum": ["all", "pending", "in_progress", "completed", "overdue"]},
                        "granularity": {"type": "string", "enum": ["day", "week", "month"]}
                    }
                },
                "DrillDownTarget": {
                    "type": "object",
                    "required": ["kind"],
                    "description": "status (bucket), project (id), team (id) or day (date)",
                    "properties": {
                        "kind": {"type": "string", "enum": ["status", "project", "team", "day"]},
                        "bucket": {"type": "string"},
                        "id": {"type": "string", "format": "uuid"},
                        "date": {"type": "string", "format": "date"}
                    }
                },
                "ReportData": {
                    "type": "object",
                    "properties": {
                        "date_range": {"type": "object"},
                        "filtered_tasks": {"type": "array", "items": {"type": "object"}},
                        "timeline_data": {"type": "array", "items": {"type": "object"}},
                        "trend_data": {"type": "array", "items": {"type": "object"}},
                        "project_performance_data": {"type": "array", "items": {"type": "object"}},
                        "task_distribution_data": {"type": "array", "items": {"type": "object"}},
                        "team_productivity_data": {"type": "array", "items": {"type": "object"}},
                        "kpis": {"type": "object"}
                    }
                }
            }
        }
    })
}

/// Swagger UI HTML template
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Planeja+ API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;
