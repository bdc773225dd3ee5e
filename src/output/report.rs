use super::SectionView;
use crate::storage::{Toast, ToastKind};
use crate::utils::escape_html;

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

fn render_toast(toast: Option<&Toast>) -> String {
    let toast = match toast {
        Some(toast) => toast,
        None => return String::new(),
    };
    let (classes, icon) = match toast.kind {
        ToastKind::Success => ("bg-green-50 border-green-200 text-green-800", "check_circle"),
        ToastKind::Error => ("bg-red-50 border-red-200 text-red-800", "error"),
    };
    format!(
        r#"      <div id="toast" data-type="{}" class="flex items-center gap-3 border rounded-2xl px-5 py-4 mb-8 {}">
        <span class="material-symbols-outlined">{}</span>
        <p class="font-bold">{}</p>
      </div>
"#,
        toast.kind.as_str(),
        classes,
        icon,
        escape_html(&toast.message)
    )
}

fn render_section(section: &SectionView) -> String {
    let page_label = match (section.current_page, section.total_pages) {
        (Some(current), Some(total)) => format!("Page {current} of {total}"),
        _ => "Not loaded".to_string(),
    };
    let body = if section.current_page.is_some() {
        section.html.clone()
    } else {
        format!(
            "<p class=\"text-slate-500 font-medium\">{}</p>\n",
            escape_html(section.message.as_deref().unwrap_or_default())
        )
    };
    format!(
        r#"      <section id="{}" class="bg-white dark:bg-slate-900 border border-slate-200 dark:border-slate-800 rounded-2xl overflow-hidden shadow-sm mb-8">
        <div class="px-8 py-5 border-b border-slate-100 dark:border-slate-800 flex items-center justify-between">
          <h2 class="text-slate-900 dark:text-white text-xl uppercase tracking-tight">{}</h2>
          <p class="text-xs text-slate-500 dark:text-slate-400 font-bold uppercase tracking-widest">{}</p>
        </div>
        <div class="overflow-x-auto p-6">
{}
        </div>
      </section>
"#,
        section.entity,
        escape_html(&section.title),
        page_label,
        body
    )
}

/// A standalone page holding every rendered list. The section data is also
/// embedded as JSON for tooling that scrapes the report.
pub fn render_html(sections: &[SectionView], patient_id: &str, toast: Option<&Toast>) -> Vec<u8> {
    let json = serde_json::to_string(sections).unwrap_or_else(|_| "[]".to_string());
    let json = json_for_script_tag(&json);
    let toast_html = render_toast(toast);
    let sections_html: String = sections.iter().map(render_section).collect();
    let patient = escape_html(patient_id);

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>Patient {patient} History</title>
  <script src="https://cdn.tailwindcss.com?plugins=forms,container-queries"></script>
  <link href="https://fonts.googleapis.com/css2?family=Material+Symbols+Outlined:wght,FILL@100..700,0..1&amp;display=swap" rel="stylesheet"/>
  <link href="https://fonts.googleapis.com/css2?family=Montserrat:wght@700;800&amp;family=Inter:wght@400;500;600;700&amp;display=swap" rel="stylesheet"/>
  <style type="text/tailwindcss">
    body {{
      font-family: 'Inter', sans-serif;
    }}
    h1, h2, h3 {{
      font-family: 'Montserrat', sans-serif;
      font-weight: 800;
      letter-spacing: -0.025em;
    }}
  </style>
</head>
<body class="bg-slate-50 dark:bg-slate-900 text-slate-900 dark:text-slate-100 min-h-screen">
  <script type="application/json" id="sections-data">{json}</script>
  <div class="layout-container flex h-full grow flex-col">
    <header class="flex items-center justify-between border-b border-slate-200 dark:border-slate-800 bg-white dark:bg-slate-900 px-8 py-4 sticky top-0 z-50">
      <div class="flex items-center gap-4">
        <div class="size-10 bg-blue-600 rounded-xl flex items-center justify-center text-white">
          <span class="material-symbols-outlined text-[24px]">medical_information</span>
        </div>
        <h2 class="text-slate-900 dark:text-white text-xl uppercase tracking-tight">Patient History</h2>
      </div>
      <p class="text-sm font-bold text-slate-500">Patient #{patient}</p>
    </header>

    <main class="flex-1 max-w-[1440px] mx-auto w-full px-8 py-10">
{toast_html}{sections_html}    </main>

    <footer class="mt-auto py-8 border-t border-slate-200 dark:border-slate-800 text-center">
      <p class="text-xs font-bold text-slate-400 dark:text-slate-500 uppercase tracking-widest">MEDHISTORY</p>
    </footer>
  </div>
</body>
</html>
"####,
    );

    html.into_bytes()
}
