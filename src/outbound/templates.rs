use compute::notify::{Notification, Recipient};

pub struct RenderedMail {
    pub subject: String,
    pub html: String,
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; color: #222;">
<div style="max-width: 600px; margin: 0 auto; padding: 24px;">
<h2 style="color: #1a73e8;">{title}</h2>
{body}
<p style="color: #888; font-size: 12px;">Este es un mensaje automático, por favor no respondas a este correo.</p>
</div>
</body>
</html>"#
    )
}

pub fn render(recipient: &Recipient, notification: &Notification) -> RenderedMail {
    let name = escape(&recipient.name);
    match notification {
        Notification::AdminApproved => RenderedMail {
            subject: "Tu solicitud de administrador fue aprobada".to_string(),
            html: layout(
                "Solicitud aprobada",
                &format!(
                    "<p>Hola {name},</p>\
                     <p>Tu solicitud para ser administrador fue aprobada. \
                     Ya puedes iniciar sesión con tu cuenta.</p>"
                ),
            ),
        },
        Notification::CourseCompleted {
            course_name,
            school_name,
            stats,
        } => {
            let course = escape(course_name);
            let school = escape(school_name);
            RenderedMail {
                subject: format!("Finalizaste el curso {course_name}"),
                html: layout(
                    "Curso finalizado",
                    &format!(
                        "<p>Hola {name},</p>\
                         <p>El curso <strong>{course}</strong> de {school} ha finalizado.</p>\
                         <p>Tu progreso final es de <strong>{progress}%</strong>.</p>\
                         <table cellpadding=\"4\">\
                         <tr><td>Clases dictadas</td><td>{total}</td></tr>\
                         <tr><td>Asistencias</td><td>{present}</td></tr>\
                         <tr><td>Llegadas tarde</td><td>{late}</td></tr>\
                         <tr><td>Ausencias</td><td>{absent}</td></tr>\
                         </table>",
                        progress = stats.progress,
                        total = stats.total_classes,
                        present = stats.present,
                        late = stats.late,
                        absent = stats.absent,
                    ),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AttendanceStats;

    fn recipient() -> Recipient {
        Recipient {
            email: "ana@example.com".to_string(),
            name: "Ana <Gomez>".to_string(),
        }
    }

    #[test]
    fn test_course_completed_lists_breakdown() {
        let mail = render(
            &recipient(),
            &Notification::CourseCompleted {
                course_name: "Natación".to_string(),
                school_name: "Escuela Azul".to_string(),
                stats: AttendanceStats::new(10, 8, 1, 1),
            },
        );

        assert_eq!(mail.subject, "Finalizaste el curso Natación");
        assert!(mail.html.contains("<strong>80%</strong>"));
        assert!(mail.html.contains("<td>Asistencias</td><td>8</td>"));
        assert!(mail.html.contains("Ana &lt;Gomez&gt;"));
    }

    #[test]
    fn test_admin_approved() {
        let mail = render(&recipient(), &Notification::AdminApproved);
        assert!(mail.subject.contains("aprobada"));
    }
}
